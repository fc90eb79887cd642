//! Group-level consent: the in-app "soft ask" answer recorded per group.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::group::GroupId;
use crate::storage::Database;

/// Key namespace used when no other prefix is configured.
pub const DEFAULT_KEY_PREFIX: &str = "___np_local_notifications_app_permission_group:";

/// Stored group-level consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupConsent {
    NotAsked,
    Allowed,
    Denied,
}

impl GroupConsent {
    pub fn is_allowed(self) -> bool {
        self == GroupConsent::Allowed
    }

    fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => GroupConsent::Allowed,
            Some(false) => GroupConsent::Denied,
            None => GroupConsent::NotAsked,
        }
    }
}

/// Key/value environment backing the consent store.
///
/// A missing key means the group was never asked.
pub trait ConsentEnv: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<bool>, StorageError>;
    fn set(&self, key: &str, value: bool) -> Result<(), StorageError>;
    /// Forget the stored answer. Default implementations may not support it.
    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Durable mapping from group id to [`GroupConsent`].
#[derive(Clone)]
pub struct GroupConsentStore {
    env: Arc<dyn ConsentEnv>,
    prefix: String,
}

impl GroupConsentStore {
    pub fn new(env: Arc<dyn ConsentEnv>) -> Self {
        Self::with_prefix(env, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(env: Arc<dyn ConsentEnv>, prefix: impl Into<String>) -> Self {
        Self {
            env,
            prefix: prefix.into(),
        }
    }

    /// Storage key for a group: the configured prefix followed by the id.
    pub fn key_for(&self, group: &GroupId) -> String {
        format!("{}{}", self.prefix, group)
    }

    pub fn get(&self, group: &GroupId) -> Result<GroupConsent, StorageError> {
        let flag = self.env.get(&self.key_for(group))?;
        Ok(GroupConsent::from_flag(flag))
    }

    pub fn set(&self, group: &GroupId, allowed: bool) -> Result<(), StorageError> {
        tracing::info!(group = %group, allowed, "group consent updated");
        self.env.set(&self.key_for(group), allowed)
    }

    /// Return the group to `NotAsked`.
    pub fn reset(&self, group: &GroupId) -> Result<(), StorageError> {
        tracing::info!(group = %group, "group consent reset");
        self.env.remove(&self.key_for(group))
    }
}

/// In-process consent environment.
///
/// Counts every access so callers can verify that a code path never touched
/// the store.
#[derive(Default)]
pub struct MemoryConsentEnv {
    values: Mutex<HashMap<String, bool>>,
    accesses: AtomicUsize,
}

impl MemoryConsentEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get`/`set`/`remove` calls served so far.
    pub fn access_count(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }
}

impl ConsentEnv for MemoryConsentEnv {
    fn get(&self, key: &str) -> Result<Option<bool>, StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// Consent environment persisted in the SQLite `kv` table.
pub struct SqliteConsentEnv {
    db: Arc<Database>,
}

impl SqliteConsentEnv {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ConsentEnv for SqliteConsentEnv {
    fn get(&self, key: &str) -> Result<Option<bool>, StorageError> {
        match self.db.kv_get(key)? {
            Some(raw) => raw
                .parse::<bool>()
                .map(Some)
                .map_err(|e| StorageError::QueryFailed(format!("bad consent value for {key}: {e}"))),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.db.kv_set(key, if value { "true" } else { "false" })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.db.kv_delete(key)
    }
}
