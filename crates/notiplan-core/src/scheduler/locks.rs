//! Per-group serialization of scheduling runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::group::GroupId;

/// One async mutex per group id.
///
/// Two runs for the same group never interleave their evaluate, purge and
/// add steps. Runs for different groups proceed independently.
#[derive(Clone, Default)]
pub struct GroupLocks {
    locks: Arc<Mutex<HashMap<GroupId, Arc<AsyncMutex<()>>>>>,
    disabled: bool,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that never block.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Wait for exclusive access to `group`. Returns `None` when disabled.
    pub async fn acquire(&self, group: &GroupId) -> Option<OwnedMutexGuard<()>> {
        if self.disabled {
            return None;
        }
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            // Entries only this map holds are idle.
            locks.retain(|id, lock| id == group || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(group.clone()).or_default())
        };
        Some(lock.lock_owned().await)
    }

    /// Number of groups currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
