//! Group scheduler: evaluate a strategy, then clear and materialize a
//! group's timeline into the notification center.
//!
//! Every platform notification a group owns is namespaced as
//! `"{group}:{trigger}"`, so a reschedule can purge exactly that group's
//! pending requests before adding the new ones:
//!
//! 1. evaluate the [`PermissionStrategy`];
//! 2. when allowed, purge (if asked to) and wait for the purge to finish;
//! 3. fetch the timeline and produce content for every trigger;
//! 4. add produced content, remove ids whose producer yielded nothing.
//!
//! Steps 2 to 4 run under a per-group lock, and on the main queue for
//! [`ExecutionPreference::MainQueueOnly`] groups.
//!
//! A denied group has its pending requests purged instead.

mod dispatch_log;
mod locks;

pub use dispatch_log::{DispatchAction, DispatchLog, DispatchRecord, DispatchStatus};
pub use locks::GroupLocks;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};

use crate::consent::{
    AuthorizationOptions, ConsentEnv, GroupConsent, GroupConsentStore, SystemConsent,
    SystemConsentGateway, DEFAULT_KEY_PREFIX,
};
use crate::error::PlatformError;
use crate::evaluator::{PermissionResult, StrategyEvaluator};
use crate::group::{AdHocGroup, ExecutionPreference, GroupId, NotificationGroup};
use crate::main_queue::MainQueue;
use crate::platform::{NotificationCenter, PendingRequest, PermissionEnv};
use crate::storage::Config;
use crate::strategy::PermissionStrategy;
use crate::timeline::{
    ContentProducer, NotificationContent, ResolvedDate, Timeline, Trigger, TriggerSet,
};

/// Outcome of a scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingResult {
    ScheduledSuccessfully,
    /// The first failure reported by the notification center.
    SystemError(PlatformError),
    DeniedOnGroupLevel,
    DeniedOnSystemLevel,
}

impl SchedulingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SchedulingResult::ScheduledSuccessfully)
    }
}

impl From<PermissionResult> for SchedulingResult {
    fn from(result: PermissionResult) -> Self {
        match result {
            PermissionResult::Allowed => SchedulingResult::ScheduledSuccessfully,
            PermissionResult::DeniedOnGroupLevel => SchedulingResult::DeniedOnGroupLevel,
            PermissionResult::DeniedOnSystemLevel => SchedulingResult::DeniedOnSystemLevel,
        }
    }
}

/// Combined group and system consent, as shown in a settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalAuthorizationStatus {
    Enabled,
    Disabled,
    SystemDenied,
}

impl FinalAuthorizationStatus {
    pub fn is_enabled(self) -> bool {
        self == FinalAuthorizationStatus::Enabled
    }
}

/// Wires the environments into a [`GroupScheduler`].
pub struct SchedulerBuilder {
    consent_env: Arc<dyn ConsentEnv>,
    permission_env: Arc<dyn PermissionEnv>,
    center: Arc<dyn NotificationCenter>,
    key_prefix: String,
    options: AuthorizationOptions,
    serialize_per_group: bool,
    main_queue: Option<MainQueue>,
}

impl SchedulerBuilder {
    pub fn new(
        consent_env: Arc<dyn ConsentEnv>,
        permission_env: Arc<dyn PermissionEnv>,
        center: Arc<dyn NotificationCenter>,
    ) -> Self {
        Self {
            consent_env,
            permission_env,
            center,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            options: AuthorizationOptions::default(),
            serialize_per_group: true,
            main_queue: None,
        }
    }

    /// Apply the consent, authorization and scheduler sections of `config`.
    pub fn config(self, config: &Config) -> Self {
        self.key_prefix(config.consent.key_prefix.clone())
            .authorization_options(config.authorization.options())
            .serialize_per_group(config.scheduler.serialize_per_group)
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn authorization_options(mut self, options: AuthorizationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn serialize_per_group(mut self, enabled: bool) -> Self {
        self.serialize_per_group = enabled;
        self
    }

    /// Share an existing main queue instead of starting one.
    pub fn main_queue(mut self, queue: MainQueue) -> Self {
        self.main_queue = Some(queue);
        self
    }

    /// # Panics
    /// Panics outside a tokio runtime when no main queue was supplied.
    pub fn build(self) -> GroupScheduler {
        let consent = GroupConsentStore::with_prefix(self.consent_env, self.key_prefix);
        let gateway = SystemConsentGateway::with_options(self.permission_env, self.options);
        let main_queue = self.main_queue.unwrap_or_else(MainQueue::spawn);
        let locks = if self.serialize_per_group {
            GroupLocks::new()
        } else {
            GroupLocks::disabled()
        };

        GroupScheduler {
            evaluator: StrategyEvaluator::new(consent, gateway, main_queue),
            center: self.center,
            locks,
        }
    }
}

/// Permission-aware scheduler for notification groups.
///
/// Cheap to clone; clones share the main queue and the per-group locks.
#[derive(Clone)]
pub struct GroupScheduler {
    evaluator: StrategyEvaluator,
    center: Arc<dyn NotificationCenter>,
    locks: GroupLocks,
}

impl GroupScheduler {
    pub fn builder(
        consent_env: Arc<dyn ConsentEnv>,
        permission_env: Arc<dyn PermissionEnv>,
        center: Arc<dyn NotificationCenter>,
    ) -> SchedulerBuilder {
        SchedulerBuilder::new(consent_env, permission_env, center)
    }

    pub fn evaluator(&self) -> &StrategyEvaluator {
        &self.evaluator
    }

    pub fn consent(&self) -> &GroupConsentStore {
        self.evaluator.consent()
    }

    pub fn center(&self) -> &Arc<dyn NotificationCenter> {
        &self.center
    }

    pub fn main_queue(&self) -> &MainQueue {
        self.evaluator.main_queue()
    }

    /// Evaluate `strategy` for a throwaway group. Nothing is scheduled.
    pub async fn request_permission(&self, strategy: &PermissionStrategy) -> bool {
        self.with_permission(strategy, None, || async {})
            .await
            .is_allowed()
    }

    /// Evaluate `strategy` and run `perform` only when allowed.
    pub async fn with_permission<F, Fut>(
        &self,
        strategy: &PermissionStrategy,
        group: Option<GroupId>,
        perform: F,
    ) -> PermissionResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let group = group.unwrap_or_else(GroupId::random);
        let result = self.evaluator.evaluate(strategy, &group).await;
        if result.is_allowed() {
            perform().await;
        }
        result
    }

    /// Schedule `timeline` as an ad-hoc group without clearing earlier
    /// notifications. The returned group can later be rescheduled or
    /// disabled.
    pub async fn schedule(
        &self,
        timeline: Timeline,
        strategy: &PermissionStrategy,
        group: Option<GroupId>,
    ) -> (AdHocGroup, SchedulingResult) {
        let group = AdHocGroup::new(timeline, group);
        let result = self.reschedule_group(&group, strategy, false).await;
        (group, result)
    }

    /// Schedule one piece of content at one date.
    ///
    /// A date that is not in the future schedules nothing.
    pub async fn schedule_content(
        &self,
        content: NotificationContent,
        at: ResolvedDate,
        strategy: &PermissionStrategy,
        group: Option<GroupId>,
    ) -> (AdHocGroup, SchedulingResult) {
        let request = TriggerSet::from_dates([at], Utc::now()).schedule(content);
        self.schedule(Timeline::new(vec![request]), strategy, group)
            .await
    }

    /// Replace everything `group` has pending with its current timeline.
    pub async fn reschedule<G>(&self, group: &G, strategy: &PermissionStrategy) -> bool
    where
        G: NotificationGroup + ?Sized,
    {
        self.reschedule_group(group, strategy, true)
            .await
            .is_success()
    }

    /// Reschedule on a background task and hand the outcome to `completion`
    /// on the main queue.
    pub fn reschedule_then<G, F>(
        &self,
        group: Arc<G>,
        strategy: PermissionStrategy,
        completion: F,
    ) -> JoinHandle<()>
    where
        G: NotificationGroup + ?Sized + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let success = scheduler.reschedule(group.as_ref(), &strategy).await;
            scheduler
                .main_queue()
                .run(async move { completion(success) })
                .await;
        })
    }

    pub async fn reschedule_group<G>(
        &self,
        group: &G,
        strategy: &PermissionStrategy,
        clear_existing: bool,
    ) -> SchedulingResult
    where
        G: NotificationGroup + ?Sized,
    {
        self.reschedule_group_logged(group, strategy, clear_existing)
            .await
            .0
    }

    /// Core routine. The dispatch log is `None` when permission was denied.
    ///
    /// The strategy is evaluated first, outside the group lock, since a
    /// prompt may need the main queue. The lock then covers the purge and the
    /// materialization. A `MainQueueOnly` group takes its lock inside its main
    /// queue turn, so a lock holder never waits for the main queue.
    ///
    /// # Panics
    /// Panics if the group id contains `:`.
    pub async fn reschedule_group_logged<G>(
        &self,
        group: &G,
        strategy: &PermissionStrategy,
        clear_existing: bool,
    ) -> (SchedulingResult, Option<DispatchLog>)
    where
        G: NotificationGroup + ?Sized,
    {
        let id = group.identifier().clone();
        id.validate();

        let permission = self.evaluator.evaluate(strategy, &id).await;
        let apply = self.apply(group, &id, permission, clear_existing);
        match group.execution_preference() {
            ExecutionPreference::MainQueueOnly => self.main_queue().run_here(apply).await,
            ExecutionPreference::AnyQueue => apply.await,
        }
    }

    /// Purge and materialize under the group lock.
    async fn apply<G>(
        &self,
        group: &G,
        id: &GroupId,
        permission: PermissionResult,
        clear_existing: bool,
    ) -> (SchedulingResult, Option<DispatchLog>)
    where
        G: NotificationGroup + ?Sized,
    {
        let _guard = self.locks.acquire(id).await;

        if !permission.is_allowed() {
            let purged = self.purge_pending(id).await;
            tracing::info!(group = %id, ?permission, purged, "group not scheduled");
            return (permission.into(), None);
        }

        let purged = if clear_existing {
            self.purge_pending(id).await
        } else {
            0
        };

        let timeline = group.timeline().await;
        let records = match group.execution_preference() {
            ExecutionPreference::MainQueueOnly => {
                materialize_sequential(self.center.as_ref(), id, timeline).await
            }
            ExecutionPreference::AnyQueue => {
                materialize_concurrent(Arc::clone(&self.center), id.clone(), timeline).await
            }
        };

        let log = DispatchLog::new(id.clone(), purged, records);
        tracing::info!(
            group = %id,
            purged = log.purged,
            added = log.added_count(),
            removed = log.removed_count(),
            failed = log.failure_count(),
            "group scheduled"
        );

        let result = match log.first_failure() {
            Some(error) => SchedulingResult::SystemError(error.clone()),
            None => SchedulingResult::ScheduledSuccessfully,
        };
        (result, Some(log))
    }

    /// Add one raw request when `strategy` allows it.
    ///
    /// The request is passed through as is: its id is not namespaced and a
    /// repeating trigger is accepted.
    pub async fn direct_schedule(
        &self,
        request: PendingRequest,
        strategy: &PermissionStrategy,
    ) -> SchedulingResult {
        let permission = self.evaluator.evaluate(strategy, &GroupId::random()).await;
        if !permission.is_allowed() {
            return permission.into();
        }

        let id = request.identifier.clone();
        match self.center.add(request).await {
            Ok(()) => {
                tracing::info!(id = %id, "request scheduled directly");
                SchedulingResult::ScheduledSuccessfully
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "direct schedule failed");
                SchedulingResult::SystemError(e)
            }
        }
    }

    /// Record a group-level refusal and purge the group's pending requests.
    /// No strategy is evaluated.
    ///
    /// # Panics
    /// Panics if the group id contains `:`.
    pub async fn disable(&self, group: &GroupId) {
        group.validate();
        let _guard = self.locks.acquire(group).await;

        if let Err(e) = self.consent().set(group, false) {
            tracing::warn!(group = %group, error = %e, "failed to record group refusal");
        }
        let purged = self.purge_pending(group).await;
        tracing::info!(group = %group, purged, "group disabled");
    }

    /// Same as [`disable`](Self::disable).
    pub async fn remove(&self, group: &GroupId) {
        self.disable(group).await;
    }

    /// Combined consent state for a group. Never prompts.
    pub async fn current_authorization_status(&self, group: &GroupId) -> FinalAuthorizationStatus {
        match self.evaluator.gateway().current().await {
            SystemConsent::DeniedNow | SystemConsent::DeniedPreviously => {
                FinalAuthorizationStatus::SystemDenied
            }
            SystemConsent::Undetermined => FinalAuthorizationStatus::Disabled,
            SystemConsent::Success => match self.consent().get(group) {
                Ok(GroupConsent::Allowed) => FinalAuthorizationStatus::Enabled,
                Ok(GroupConsent::Denied | GroupConsent::NotAsked) => {
                    FinalAuthorizationStatus::Disabled
                }
                Err(e) => {
                    tracing::warn!(group = %group, error = %e, "failed to read group consent");
                    FinalAuthorizationStatus::Disabled
                }
            },
        }
    }

    /// Remove every pending request namespaced under `group`.
    async fn purge_pending(&self, group: &GroupId) -> usize {
        let ids: Vec<String> = self
            .center
            .pending_ids()
            .await
            .into_iter()
            .filter(|id| group.owns(id))
            .collect();

        if !ids.is_empty() {
            tracing::debug!(group = %group, count = ids.len(), "purging pending notifications");
            self.center.remove_pending(&ids).await;
        }
        ids.len()
    }
}

fn work_items(timeline: Timeline) -> Vec<(Arc<dyn ContentProducer>, Trigger)> {
    timeline
        .into_iter()
        .flat_map(|request| {
            let producer = request.producer();
            request
                .triggers()
                .iter()
                .map(|trigger| (Arc::clone(&producer), trigger.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}

async fn materialize_sequential(
    center: &dyn NotificationCenter,
    group: &GroupId,
    timeline: Timeline,
) -> Vec<DispatchRecord> {
    let mut records = Vec::new();
    for (producer, trigger) in work_items(timeline) {
        records.push(dispatch(center, group, producer.as_ref(), &trigger).await);
    }
    records
}

async fn materialize_concurrent(
    center: Arc<dyn NotificationCenter>,
    group: GroupId,
    timeline: Timeline,
) -> Vec<DispatchRecord> {
    let mut tasks = JoinSet::new();
    for (index, (producer, trigger)) in work_items(timeline).into_iter().enumerate() {
        let center = Arc::clone(&center);
        let group = group.clone();
        tasks.spawn(async move {
            let record = dispatch(center.as_ref(), &group, producer.as_ref(), &trigger).await;
            (index, record)
        });
    }

    let mut records = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => records.push(entry),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => tracing::error!(group = %group, error = %e, "dispatch task cancelled"),
        }
    }
    records.sort_by_key(|(index, _)| *index);
    records.into_iter().map(|(_, record)| record).collect()
}

async fn dispatch(
    center: &dyn NotificationCenter,
    group: &GroupId,
    producer: &dyn ContentProducer,
    trigger: &Trigger,
) -> DispatchRecord {
    assert!(
        !trigger.raw().repeats(),
        "repeating triggers are not supported"
    );
    let id = group.notification_id(trigger.identifier());

    let Some(content) = producer.make_content(trigger).await else {
        let ids = [id.clone()];
        center.remove_pending(&ids).await;
        center.remove_delivered(&ids).await;
        tracing::debug!(id = %id, "no content, notification removed");
        return DispatchRecord::removed(id);
    };

    let request = PendingRequest {
        identifier: id.clone(),
        content,
        trigger: trigger.raw().clone(),
    };
    match center.add(request).await {
        Ok(()) => DispatchRecord::added(id),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "failed to add notification");
            DispatchRecord::failed(id, e)
        }
    }
}
