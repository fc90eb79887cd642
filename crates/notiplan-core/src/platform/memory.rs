//! In-process platform implementations.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{NotificationCenter, PendingRequest, PermissionEnv, PlatformStatus};
use crate::consent::AuthorizationOptions;
use crate::error::PlatformError;
use crate::timeline::NotificationContent;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One call observed by [`MemoryNotificationCenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CenterOp {
    Add(String),
    RemovePending(Vec<String>),
    RemoveDelivered(Vec<String>),
    ListPending,
}

/// Dispatch service kept in memory.
///
/// Records every call in order and can be told to reject specific ids.
#[derive(Default)]
pub struct MemoryNotificationCenter {
    pending: Mutex<BTreeMap<String, PendingRequest>>,
    delivered: Mutex<BTreeMap<String, NotificationContent>>,
    rejected_ids: Mutex<HashSet<String>>,
    ops: Mutex<Vec<CenterOp>>,
}

impl MemoryNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `add` for `id` fail.
    pub fn reject(&self, id: impl Into<String>) {
        lock(&self.rejected_ids).insert(id.into());
    }

    /// Present a pending notification: move it to the delivered list.
    pub fn deliver(&self, id: &str) -> bool {
        let Some(request) = lock(&self.pending).remove(id) else {
            return false;
        };
        lock(&self.delivered).insert(request.identifier, request.content);
        true
    }

    /// Every call seen so far, in order.
    pub fn operations(&self) -> Vec<CenterOp> {
        lock(&self.ops).clone()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        lock(&self.pending).keys().cloned().collect()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        lock(&self.delivered).keys().cloned().collect()
    }

    fn record(&self, op: CenterOp) {
        lock(&self.ops).push(op);
    }
}

#[async_trait]
impl NotificationCenter for MemoryNotificationCenter {
    async fn add(&self, request: PendingRequest) -> Result<(), PlatformError> {
        self.record(CenterOp::Add(request.identifier.clone()));
        if lock(&self.rejected_ids).contains(&request.identifier) {
            return Err(PlatformError::Rejected {
                id: request.identifier,
                message: "rejected by test center".to_string(),
            });
        }
        lock(&self.pending).insert(request.identifier.clone(), request);
        Ok(())
    }

    async fn remove_pending(&self, ids: &[String]) {
        self.record(CenterOp::RemovePending(ids.to_vec()));
        let mut pending = lock(&self.pending);
        for id in ids {
            pending.remove(id);
        }
    }

    async fn remove_delivered(&self, ids: &[String]) {
        self.record(CenterOp::RemoveDelivered(ids.to_vec()));
        let mut delivered = lock(&self.delivered);
        for id in ids {
            delivered.remove(id);
        }
    }

    async fn pending(&self) -> Vec<PendingRequest> {
        self.record(CenterOp::ListPending);
        lock(&self.pending).values().cloned().collect()
    }

    async fn delivered(&self) -> Vec<String> {
        self.delivered_ids()
    }
}

/// OS permission API kept in memory.
///
/// Prompts are answered with a preset answer and change the stored status
/// the way a real OS does.
pub struct MemoryPermissionEnv {
    status: Mutex<PlatformStatus>,
    answer: Mutex<bool>,
    failure: Mutex<Option<PlatformError>>,
    last_options: Mutex<Option<AuthorizationOptions>>,
    prompts: AtomicUsize,
    queries: AtomicUsize,
}

impl MemoryPermissionEnv {
    pub fn new(status: PlatformStatus) -> Self {
        Self {
            status: Mutex::new(status),
            answer: Mutex::new(true),
            failure: Mutex::new(None),
            last_options: Mutex::new(None),
            prompts: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: PlatformStatus) {
        *lock(&self.status) = status;
    }

    /// Answer future prompts with `granted`.
    pub fn answer_prompts_with(&self, granted: bool) {
        *lock(&self.answer) = granted;
    }

    /// Make future prompts fail with `error`.
    pub fn fail_requests_with(&self, error: PlatformError) {
        *lock(&self.failure) = Some(error);
    }

    /// Number of prompts presented.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Number of status queries plus prompts, i.e. every interaction.
    pub fn interaction_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst) + self.prompt_count()
    }

    pub fn last_requested_options(&self) -> Option<AuthorizationOptions> {
        *lock(&self.last_options)
    }
}

#[async_trait]
impl PermissionEnv for MemoryPermissionEnv {
    async fn authorization_status(&self) -> Result<PlatformStatus, PlatformError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(*lock(&self.status))
    }

    async fn request_authorization(
        &self,
        options: AuthorizationOptions,
    ) -> Result<bool, PlatformError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_options) = Some(options);

        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }

        let granted = *lock(&self.answer);
        self.set_status(if granted {
            PlatformStatus::Authorized
        } else {
            PlatformStatus::Denied
        });
        Ok(granted)
    }
}
