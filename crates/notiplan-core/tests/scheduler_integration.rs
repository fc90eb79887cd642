//! Integration tests for group scheduling.
//!
//! These tests drive the scheduler end to end against the in-memory
//! notification center and permission API, plus one SQLite-backed run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use notiplan_core::platform::CenterOp;
use notiplan_core::{
    content_fn, ask_fn, AdHocGroup, AskMode, ExecutionPreference, FinalAuthorizationStatus,
    GroupConsent, GroupId, GroupLevel, GroupScheduler, MainQueue, MemoryConsentEnv,
    MemoryNotificationCenter, MemoryPermissionEnv, NotificationCenter, NotificationContent,
    NotificationGroup,
    PendingRequest, PermissionResult, PermissionStrategy, PlatformError, PlatformStatus,
    PlatformTrigger, ResolvedDate, SchedulingResult, SystemLevel, Timeline, Trigger, TriggerId,
    TriggerSet,
};

struct Harness {
    consent: Arc<MemoryConsentEnv>,
    permission: Arc<MemoryPermissionEnv>,
    center: Arc<MemoryNotificationCenter>,
    scheduler: GroupScheduler,
}

fn harness(status: PlatformStatus) -> Harness {
    let consent = Arc::new(MemoryConsentEnv::new());
    let permission = Arc::new(MemoryPermissionEnv::new(status));
    let center = Arc::new(MemoryNotificationCenter::new());
    let scheduler =
        GroupScheduler::builder(consent.clone(), permission.clone(), center.clone()).build();
    Harness {
        consent,
        permission,
        center,
        scheduler,
    }
}

/// A named group with three fixed triggers; triggers listed in `skip`
/// produce no content. Each timeline fetch records whether it ran on the
/// main queue.
struct QuoteGroup {
    id: GroupId,
    preference: ExecutionPreference,
    skip: Arc<Mutex<HashSet<String>>>,
    fetched_on_main_queue: Mutex<Vec<bool>>,
}

impl QuoteGroup {
    fn new(id: &str) -> Self {
        Self {
            id: GroupId::new(id),
            preference: ExecutionPreference::MainQueueOnly,
            skip: Arc::default(),
            fetched_on_main_queue: Mutex::default(),
        }
    }

    fn any_queue(mut self) -> Self {
        self.preference = ExecutionPreference::AnyQueue;
        self
    }

    fn skip(&self, trigger: &str) {
        self.skip.lock().unwrap().insert(trigger.to_string());
    }
}

#[async_trait]
impl NotificationGroup for QuoteGroup {
    fn identifier(&self) -> &GroupId {
        &self.id
    }

    fn execution_preference(&self) -> ExecutionPreference {
        self.preference
    }

    async fn timeline(&self) -> Timeline {
        self.fetched_on_main_queue
            .lock()
            .unwrap()
            .push(MainQueue::is_current());
        let triggers: TriggerSet = (1..=3)
            .map(|i| {
                Trigger::new(
                    PlatformTrigger::after_seconds(3600 * i),
                    TriggerId::new(format!("t{i}")),
                )
            })
            .collect();
        let skip = Arc::clone(&self.skip);
        Timeline::new(vec![triggers.schedule_with(content_fn(move |t: &Trigger| {
            let skipped = skip.lock().unwrap().contains(t.identifier().as_str());
            (!skipped).then(|| NotificationContent::titled("Quote", t.identifier().to_string()))
        }))])
    }
}

/// A group whose id was deserialized and so bypassed validation.
struct InvalidGroup {
    id: GroupId,
}

#[async_trait]
impl NotificationGroup for InvalidGroup {
    fn identifier(&self) -> &GroupId {
        &self.id
    }

    async fn timeline(&self) -> Timeline {
        Timeline::empty()
    }
}

fn allow_all() -> PermissionStrategy {
    PermissionStrategy::new(GroupLevel::AllowAutomatically, SystemLevel::IfAlreadyAllowed)
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_reschedule_twice_keeps_one_request_per_trigger() {
    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes");

    assert!(h.scheduler.reschedule(&group, &allow_all()).await);
    assert!(h.scheduler.reschedule(&group, &allow_all()).await);

    assert_eq!(
        h.center.pending_ids(),
        vec!["quotes:t1", "quotes:t2", "quotes:t3"]
    );
}

#[tokio::test]
async fn test_purge_precedes_every_add() {
    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes").any_queue();
    h.scheduler.reschedule(&group, &allow_all()).await;
    h.scheduler.reschedule(&group, &allow_all()).await;

    let ops = h.center.operations();
    let second_run = &ops[4..];
    let purge = second_run
        .iter()
        .position(|op| matches!(op, CenterOp::RemovePending(_)))
        .unwrap();
    let first_add = second_run
        .iter()
        .position(|op| matches!(op, CenterOp::Add(_)))
        .unwrap();
    assert!(purge < first_add);
    assert_eq!(
        second_run[purge],
        CenterOp::RemovePending(vec![
            "quotes:t1".to_string(),
            "quotes:t2".to_string(),
            "quotes:t3".to_string()
        ])
    );
}

#[tokio::test]
async fn test_denial_purges_only_the_denied_group() {
    let h = harness(PlatformStatus::Authorized);
    let quotes = QuoteGroup::new("quotes");
    let water = QuoteGroup::new("water");
    h.scheduler.reschedule(&quotes, &allow_all()).await;
    h.scheduler.reschedule(&water, &allow_all()).await;

    h.permission.set_status(PlatformStatus::Denied);
    let result = h
        .scheduler
        .reschedule_group(&quotes, &allow_all(), true)
        .await;

    assert_eq!(result, SchedulingResult::DeniedOnSystemLevel);
    assert!(h.center.pending_ids().iter().all(|id| !id.starts_with("quotes:")));
    assert_eq!(h.center.pending_ids().len(), 3);
}

#[tokio::test]
async fn test_colon_group_id_panics_before_any_call() {
    let h = harness(PlatformStatus::Authorized);
    let group = InvalidGroup {
        id: serde_json::from_str("\"daily:quote\"").unwrap(),
    };
    let scheduler = h.scheduler.clone();

    let outcome = tokio::spawn(async move {
        scheduler.reschedule(&group, &allow_all()).await;
    })
    .await;

    assert!(outcome.unwrap_err().is_panic());
    assert!(h.center.operations().is_empty());
    assert_eq!(h.consent.access_count(), 0);
    assert_eq!(h.permission.interaction_count(), 0);
}

#[tokio::test]
async fn test_allow_automatically_with_if_already_allowed() {
    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes");
    assert_eq!(
        h.scheduler.reschedule_group(&group, &allow_all(), true).await,
        SchedulingResult::ScheduledSuccessfully
    );

    h.permission.set_status(PlatformStatus::Denied);
    assert_eq!(
        h.scheduler.reschedule_group(&group, &allow_all(), true).await,
        SchedulingResult::DeniedOnSystemLevel
    );
}

#[tokio::test]
async fn test_refused_group_prompt_never_reaches_the_os() {
    let h = harness(PlatformStatus::NotDetermined);
    let group = QuoteGroup::new("quotes");
    let strategy = PermissionStrategy::ask_with_pre_permission(
        AskMode::Once,
        ask_fn(|| async { Ok(false) }),
    );

    let result = h.scheduler.reschedule_group(&group, &strategy, true).await;

    assert_eq!(result, SchedulingResult::DeniedOnGroupLevel);
    assert_eq!(
        h.scheduler.consent().get(group.identifier()).unwrap(),
        GroupConsent::Denied
    );
    assert_eq!(h.permission.interaction_count(), 0);
    assert!(h.center.pending_ids().is_empty());
}

#[tokio::test]
async fn test_missing_content_removes_pending_and_delivered() {
    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes");
    h.scheduler.reschedule(&group, &allow_all()).await;
    assert!(h.center.deliver("quotes:t2"));

    group.skip("t1");
    group.skip("t2");
    assert!(h.scheduler.reschedule(&group, &allow_all()).await);

    assert_eq!(h.center.pending_ids(), vec!["quotes:t3"]);
    assert!(h.center.delivered_ids().is_empty());
}

#[tokio::test]
async fn test_failed_add_does_not_abort_siblings() {
    for preference in [ExecutionPreference::MainQueueOnly, ExecutionPreference::AnyQueue] {
        let h = harness(PlatformStatus::Authorized);
        let mut group = QuoteGroup::new("quotes");
        group.preference = preference;
        h.center.reject("quotes:t2");

        let (result, log) = h
            .scheduler
            .reschedule_group_logged(&group, &allow_all(), true)
            .await;

        assert!(matches!(
            result,
            SchedulingResult::SystemError(PlatformError::Rejected { ref id, .. }) if id == "quotes:t2"
        ));
        assert_eq!(h.center.pending_ids(), vec!["quotes:t1", "quotes:t3"]);

        let log = log.unwrap();
        assert_eq!(log.added_count(), 2);
        assert_eq!(log.failure_count(), 1);
        assert_eq!(log.records[1].notification_id, "quotes:t2");
    }
}

#[tokio::test]
async fn test_schedule_keeps_earlier_notifications() {
    let h = harness(PlatformStatus::Authorized);
    let group_id = GroupId::new("reminders");
    let content = NotificationContent::titled("Drink water", "");

    for minutes in [10, 20] {
        let at = ResolvedDate::Exact(Utc::now() + Duration::minutes(minutes));
        let (group, result) = h
            .scheduler
            .schedule_content(content.clone(), at, &allow_all(), Some(group_id.clone()))
            .await;
        assert!(result.is_success());
        assert_eq!(group.identifier(), &group_id);
    }

    assert_eq!(h.center.pending_ids().len(), 2);
    assert!(h.center.pending_ids().iter().all(|id| group_id.owns(id)));
}

#[tokio::test]
async fn test_schedule_content_in_the_past_schedules_nothing() {
    let h = harness(PlatformStatus::Authorized);
    let at = ResolvedDate::Exact(Utc::now() - Duration::minutes(1));
    let (_, result) = h
        .scheduler
        .schedule_content(NotificationContent::titled("late", ""), at, &allow_all(), None)
        .await;
    assert!(result.is_success());
    assert!(h.center.pending_ids().is_empty());
}

#[tokio::test]
async fn test_ad_hoc_group_can_be_rescheduled() {
    let h = harness(PlatformStatus::Authorized);
    let timeline = TriggerSet::single(Trigger::new(
        PlatformTrigger::after_seconds(600),
        TriggerId::new("only"),
    ))
    .schedule(NotificationContent::titled("x", ""));

    let (group, _) = h
        .scheduler
        .schedule(Timeline::new(vec![timeline]), &allow_all(), None)
        .await;
    assert!(h.scheduler.reschedule(&group, &allow_all()).await);
    assert_eq!(
        h.center.pending_ids(),
        vec![group.identifier().notification_id(&TriggerId::new("only"))]
    );
}

#[tokio::test]
async fn test_disable_records_denial_and_purges() {
    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes");
    h.scheduler.reschedule(&group, &allow_all()).await;
    let prompts_before = h.permission.prompt_count();

    h.scheduler.disable(group.identifier()).await;

    assert!(h.center.pending_ids().is_empty());
    assert_eq!(
        h.scheduler.consent().get(group.identifier()).unwrap(),
        GroupConsent::Denied
    );
    assert_eq!(h.permission.prompt_count(), prompts_before);

    // `remove` is the same operation.
    h.scheduler.reschedule(&QuoteGroup::new("water"), &allow_all()).await;
    h.scheduler.remove(&GroupId::new("water")).await;
    assert!(h.center.pending_ids().is_empty());
}

#[tokio::test]
async fn test_current_authorization_status() {
    let h = harness(PlatformStatus::Authorized);
    let group = GroupId::new("quotes");

    assert_eq!(
        h.scheduler.current_authorization_status(&group).await,
        FinalAuthorizationStatus::Disabled
    );

    h.scheduler.consent().set(&group, true).unwrap();
    assert!(h.scheduler.current_authorization_status(&group).await.is_enabled());

    h.permission.set_status(PlatformStatus::Denied);
    assert_eq!(
        h.scheduler.current_authorization_status(&group).await,
        FinalAuthorizationStatus::SystemDenied
    );

    h.permission.set_status(PlatformStatus::NotDetermined);
    assert_eq!(
        h.scheduler.current_authorization_status(&group).await,
        FinalAuthorizationStatus::Disabled
    );
    assert_eq!(h.permission.prompt_count(), 0);
}

#[tokio::test]
async fn test_direct_schedule_passes_raw_requests_through() {
    let h = harness(PlatformStatus::Authorized);
    let request = PendingRequest {
        identifier: "morning".into(),
        content: NotificationContent::titled("Good morning", ""),
        trigger: PlatformTrigger::Calendar {
            at: (Utc::now() + Duration::days(1)).naive_utc(),
            repeats: true,
        },
    };

    let result = h
        .scheduler
        .direct_schedule(request.clone(), &PermissionStrategy::schedule_if_already_allowed())
        .await;
    assert_eq!(result, SchedulingResult::ScheduledSuccessfully);
    assert_eq!(h.center.pending_ids(), vec!["morning"]);

    h.center.reject("evening");
    let failing = PendingRequest {
        identifier: "evening".into(),
        ..request
    };
    let result = h
        .scheduler
        .direct_schedule(failing, &PermissionStrategy::schedule_if_already_allowed())
        .await;
    assert!(matches!(result, SchedulingResult::SystemError(_)));
}

#[tokio::test]
async fn test_direct_schedule_respects_denial() {
    let h = harness(PlatformStatus::Denied);
    let request = PendingRequest {
        identifier: "x".into(),
        content: NotificationContent::titled("x", ""),
        trigger: PlatformTrigger::after_seconds(60),
    };
    let result = h
        .scheduler
        .direct_schedule(request, &PermissionStrategy::ask_permission_if_needed())
        .await;
    assert_eq!(result, SchedulingResult::DeniedOnSystemLevel);
    assert!(h.center.operations().is_empty());
}

#[tokio::test]
async fn test_request_permission_schedules_nothing() {
    let h = harness(PlatformStatus::NotDetermined);
    assert!(
        h.scheduler
            .request_permission(&PermissionStrategy::ask_permission_if_needed())
            .await
    );
    assert_eq!(h.permission.prompt_count(), 1);
    assert!(h.center.operations().is_empty());
}

#[tokio::test]
async fn test_with_permission_runs_perform_only_when_allowed() {
    let h = harness(PlatformStatus::Denied);
    let ran = Arc::new(Mutex::new(false));

    let flag = Arc::clone(&ran);
    let result = h
        .scheduler
        .with_permission(&PermissionStrategy::schedule_if_already_allowed(), None, || async move {
            *flag.lock().unwrap() = true;
        })
        .await;
    assert_eq!(result, PermissionResult::DeniedOnSystemLevel);
    assert!(!*ran.lock().unwrap());

    h.permission.set_status(PlatformStatus::Authorized);
    let flag = Arc::clone(&ran);
    let result = h
        .scheduler
        .with_permission(
            &PermissionStrategy::schedule_if_already_allowed(),
            Some(GroupId::new("g")),
            || async move {
                *flag.lock().unwrap() = true;
            },
        )
        .await;
    assert_eq!(result, PermissionResult::Allowed);
    assert!(*ran.lock().unwrap());
}

#[tokio::test]
async fn test_main_queue_groups_materialize_on_the_main_queue() {
    let h = harness(PlatformStatus::Authorized);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let request = TriggerSet::single(Trigger::new(
        PlatformTrigger::after_seconds(60),
        TriggerId::new("a"),
    ))
    .schedule_with(content_fn(move |_: &Trigger| {
        recorder.lock().unwrap().push(MainQueue::is_current());
        Some(NotificationContent::titled("x", ""))
    }));
    let timeline = Timeline::new(vec![request]);

    let main = AdHocGroup::new(timeline.clone(), None);
    h.scheduler.reschedule(&main, &allow_all()).await;
    let any = AdHocGroup::new(timeline, None).with_preference(ExecutionPreference::AnyQueue);
    h.scheduler.reschedule(&any, &allow_all()).await;

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);

    let main = QuoteGroup::new("main");
    let any = QuoteGroup::new("any").any_queue();
    h.scheduler.reschedule(&main, &allow_all()).await;
    h.scheduler.reschedule(&any, &allow_all()).await;
    assert_eq!(*main.fetched_on_main_queue.lock().unwrap(), vec![true]);
    assert_eq!(*any.fetched_on_main_queue.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn test_main_queue_job_can_reschedule_while_another_run_prompts() {
    use std::time::Duration as StdDuration;

    let h = harness(PlatformStatus::Authorized);
    let group = Arc::new(QuoteGroup::new("quotes"));
    let strategy = PermissionStrategy::ask_with_pre_permission(
        AskMode::AlwaysIfNotAllowed,
        ask_fn(|| async { Ok(true) }),
    );

    let on_main = {
        let scheduler = h.scheduler.clone();
        let group = Arc::clone(&group);
        let strategy = strategy.clone();
        tokio::spawn(async move {
            let queue = scheduler.main_queue().clone();
            queue
                .run(async move {
                    tokio::time::sleep(StdDuration::from_millis(50)).await;
                    scheduler.reschedule(group.as_ref(), &strategy).await
                })
                .await
        })
    };
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    // Its prompt queues behind the job above.
    let background = {
        let scheduler = h.scheduler.clone();
        let group = Arc::clone(&group);
        tokio::spawn(async move { scheduler.reschedule(group.as_ref(), &strategy).await })
    };

    let outcome = tokio::time::timeout(StdDuration::from_secs(3), async {
        (on_main.await.unwrap(), background.await.unwrap())
    })
    .await
    .expect("reschedules of one group deadlocked");

    assert_eq!(outcome, (true, true));
    assert_eq!(
        h.center.pending_ids(),
        vec!["quotes:t1", "quotes:t2", "quotes:t3"]
    );
}

#[tokio::test]
async fn test_disable_from_the_main_queue_waits_for_nothing() {
    use std::time::Duration as StdDuration;

    let h = harness(PlatformStatus::Authorized);
    let group = QuoteGroup::new("quotes");
    h.scheduler.reschedule(&group, &allow_all()).await;

    let scheduler = h.scheduler.clone();
    let disabled = tokio::time::timeout(
        StdDuration::from_secs(3),
        h.scheduler.main_queue().run(async move {
            scheduler.disable(&GroupId::new("quotes")).await;
        }),
    )
    .await;

    assert!(disabled.is_ok());
    assert!(h.center.pending_ids().is_empty());
}

#[tokio::test]
async fn test_reschedule_then_completes_on_the_main_queue() {
    let h = harness(PlatformStatus::Authorized);
    let (tx, rx) = tokio::sync::oneshot::channel();

    h.scheduler
        .reschedule_then(Arc::new(QuoteGroup::new("quotes")), allow_all(), move |ok| {
            let _ = tx.send((ok, MainQueue::is_current()));
        })
        .await
        .unwrap();

    assert_eq!(rx.await.unwrap(), (true, true));
}

#[tokio::test]
async fn test_concurrent_reschedules_of_one_group_converge() {
    let h = harness(PlatformStatus::Authorized);
    let group = Arc::new(QuoteGroup::new("quotes").any_queue());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let scheduler = h.scheduler.clone();
        let group = Arc::clone(&group);
        tasks.spawn(async move { scheduler.reschedule(group.as_ref(), &allow_all()).await });
    }
    while let Some(done) = tasks.join_next().await {
        assert!(done.unwrap());
    }

    assert_eq!(sorted(h.center.pending_ids()).len(), 3);
}

#[tokio::test]
async fn test_denial_purges_despite_an_undecodable_foreign_row() {
    use notiplan_core::storage::PendingRow;
    use notiplan_core::{Database, SqliteConsentEnv, SqliteNotificationCenter, SqlitePermissionEnv};

    let db = Arc::new(Database::open_memory().unwrap());
    let permission = SqlitePermissionEnv::new(db.clone());
    permission.set_status(PlatformStatus::Denied).unwrap();
    let center = Arc::new(SqliteNotificationCenter::new(db.clone()));

    db.pending_upsert(&PendingRow {
        id: "other:x".into(),
        content: "not json".into(),
        trigger: "{}".into(),
        fire_at: None,
    })
    .unwrap();
    center
        .add(PendingRequest {
            identifier: "g:t1".into(),
            content: NotificationContent::titled("stale", ""),
            trigger: PlatformTrigger::after_seconds(600),
        })
        .await
        .unwrap();

    let scheduler = GroupScheduler::builder(
        Arc::new(SqliteConsentEnv::new(db.clone())),
        Arc::new(permission),
        center.clone(),
    )
    .build();
    let (_, result) = scheduler
        .schedule(
            Timeline::empty(),
            &PermissionStrategy::schedule_if_already_allowed(),
            Some(GroupId::new("g")),
        )
        .await;

    assert_eq!(result, SchedulingResult::DeniedOnSystemLevel);
    assert_eq!(center.pending_ids().await, vec!["other:x".to_string()]);
}

#[tokio::test]
async fn test_sqlite_backed_state_survives_reopen() {
    use notiplan_core::{Database, SqliteConsentEnv, SqliteNotificationCenter, SqlitePermissionEnv};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notiplan.db");

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        let permission = SqlitePermissionEnv::new(db.clone());
        permission.set_prompt_answer(true).unwrap();
        let scheduler = GroupScheduler::builder(
            Arc::new(SqliteConsentEnv::new(db.clone())),
            Arc::new(permission),
            Arc::new(SqliteNotificationCenter::new(db.clone())),
        )
        .build();

        let strategy = PermissionStrategy::new(
            GroupLevel::AllowAutomatically,
            SystemLevel::AskPermission,
        );
        assert!(scheduler.reschedule(&QuoteGroup::new("quotes"), &strategy).await);
    }

    let db = Arc::new(Database::open_at(&path).unwrap());
    let scheduler = GroupScheduler::builder(
        Arc::new(SqliteConsentEnv::new(db.clone())),
        Arc::new(SqlitePermissionEnv::new(db.clone())),
        Arc::new(SqliteNotificationCenter::new(db.clone())),
    )
    .build();

    let group = GroupId::new("quotes");
    assert!(scheduler.current_authorization_status(&group).await.is_enabled());
    let pending: Vec<String> = scheduler
        .center()
        .pending()
        .await
        .into_iter()
        .map(|r| r.identifier)
        .collect();
    assert_eq!(sorted(pending), vec!["quotes:t1", "quotes:t2", "quotes:t3"]);
}
