//! SQLite-backed platform simulator.
//!
//! Lets the CLI keep a device's pending queue and permission state between
//! runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{NotificationCenter, PendingRequest, PermissionEnv, PlatformStatus};
use crate::consent::AuthorizationOptions;
use crate::error::{PlatformError, StorageError};
use crate::storage::{Database, DeliveredRow, PendingRow};

const STATUS_KEY: &str = "system.authorization_status";
const ANSWER_KEY: &str = "system.prompt_answer";

/// Dispatch service persisted in `pending_notifications` /
/// `delivered_notifications`.
pub struct SqliteNotificationCenter {
    db: Arc<Database>,
}

impl SqliteNotificationCenter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Present every notification due at or before `now`.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Result<Vec<String>, StorageError> {
        let delivered = self.db.deliver_due(now)?;
        if !delivered.is_empty() {
            tracing::info!(count = delivered.len(), "delivered due notifications");
        }
        Ok(delivered)
    }

    /// Present one pending notification now, whatever its fire date.
    pub fn deliver(&self, id: &str) -> Result<bool, StorageError> {
        let Some(row) = self.db.pending_list()?.into_iter().find(|row| row.id == id) else {
            return Ok(false);
        };
        self.db.delivered_insert(&DeliveredRow {
            id: row.id.clone(),
            content: row.content,
            delivered_at: Utc::now(),
        })?;
        self.db.pending_remove(&[row.id])?;
        tracing::info!(id, "delivered notification");
        Ok(true)
    }

    /// Pending notifications together with their absolute fire time.
    ///
    /// Rows that no longer decode are logged and skipped.
    pub fn pending_with_fire_dates(
        &self,
    ) -> Result<Vec<(PendingRequest, Option<DateTime<Utc>>)>, PlatformError> {
        let rows = self.db.pending_list()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let fire_at = row.fire_at;
            match decode(row) {
                Ok(request) => out.push((request, fire_at)),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable pending row"),
            }
        }
        Ok(out)
    }
}

fn decode(row: PendingRow) -> Result<PendingRequest, PlatformError> {
    let corrupt = |e: serde_json::Error| {
        PlatformError::Unavailable(format!("corrupt pending row {}: {e}", row.id))
    };
    let content = serde_json::from_str(&row.content).map_err(corrupt)?;
    let trigger = serde_json::from_str(&row.trigger).map_err(corrupt)?;
    Ok(PendingRequest {
        identifier: row.id,
        content,
        trigger,
    })
}

#[async_trait]
impl NotificationCenter for SqliteNotificationCenter {
    async fn add(&self, request: PendingRequest) -> Result<(), PlatformError> {
        let encode = |e: serde_json::Error| PlatformError::Rejected {
            id: request.identifier.clone(),
            message: e.to_string(),
        };
        let row = PendingRow {
            id: request.identifier.clone(),
            content: serde_json::to_string(&request.content).map_err(encode)?,
            trigger: serde_json::to_string(&request.trigger).map_err(encode)?,
            fire_at: request.trigger.fire_date_from(Utc::now()),
        };
        self.db.pending_upsert(&row)?;
        Ok(())
    }

    async fn remove_pending(&self, ids: &[String]) {
        if let Err(e) = self.db.pending_remove(ids) {
            tracing::warn!(error = %e, "failed to remove pending notifications");
        }
    }

    async fn remove_delivered(&self, ids: &[String]) {
        if let Err(e) = self.db.delivered_remove(ids) {
            tracing::warn!(error = %e, "failed to remove delivered notifications");
        }
    }

    async fn pending(&self) -> Vec<PendingRequest> {
        match self.pending_with_fire_dates() {
            Ok(rows) => rows.into_iter().map(|(request, _)| request).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list pending notifications");
                Vec::new()
            }
        }
    }

    async fn pending_ids(&self) -> Vec<String> {
        match self.db.pending_list() {
            Ok(rows) => rows.into_iter().map(|row| row.id).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list pending notifications");
                Vec::new()
            }
        }
    }

    async fn delivered(&self) -> Vec<String> {
        match self.db.delivered_list() {
            Ok(rows) => rows.into_iter().map(|row| row.id).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list delivered notifications");
                Vec::new()
            }
        }
    }
}

/// OS permission state persisted in the `kv` table.
///
/// The answer the simulated user gives to the next prompt is stored too, so
/// it can be set ahead of time from the CLI.
pub struct SqlitePermissionEnv {
    db: Arc<Database>,
}

impl SqlitePermissionEnv {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn set_status(&self, status: PlatformStatus) -> Result<(), StorageError> {
        self.db.kv_set(STATUS_KEY, status.as_str())
    }

    /// Decide how the simulated user answers the next prompt.
    pub fn set_prompt_answer(&self, granted: bool) -> Result<(), StorageError> {
        self.db.kv_set(ANSWER_KEY, if granted { "true" } else { "false" })
    }

    pub fn prompt_answer(&self) -> Result<bool, StorageError> {
        Ok(self
            .db
            .kv_get(ANSWER_KEY)?
            .map(|raw| raw == "true")
            .unwrap_or(true))
    }
}

#[async_trait]
impl PermissionEnv for SqlitePermissionEnv {
    async fn authorization_status(&self) -> Result<PlatformStatus, PlatformError> {
        match self.db.kv_get(STATUS_KEY)? {
            Some(raw) => raw.parse(),
            None => Ok(PlatformStatus::NotDetermined),
        }
    }

    async fn request_authorization(
        &self,
        options: AuthorizationOptions,
    ) -> Result<bool, PlatformError> {
        let granted = self.prompt_answer()?;
        tracing::info!(?options, granted, "simulated system prompt answered");
        self.set_status(if granted {
            PlatformStatus::Authorized
        } else {
            PlatformStatus::Denied
        })?;
        Ok(granted)
    }
}
