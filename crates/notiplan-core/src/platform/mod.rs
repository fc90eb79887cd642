//! Platform boundary: the notification dispatch service and the OS
//! permission API.
//!
//! Real platforms implement these traits in their own crates. Two
//! implementations ship here: in-process ones for tests and embedding, and
//! SQLite-backed ones that let the CLI simulate a device across runs.

mod memory;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::consent::AuthorizationOptions;
use crate::error::PlatformError;
use crate::timeline::{NotificationContent, PlatformTrigger};

pub use memory::{CenterOp, MemoryNotificationCenter, MemoryPermissionEnv};
pub use sqlite::{SqliteNotificationCenter, SqlitePermissionEnv};

/// Raw OS authorization status, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
    Ephemeral,
}

impl PlatformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformStatus::NotDetermined => "not_determined",
            PlatformStatus::Denied => "denied",
            PlatformStatus::Authorized => "authorized",
            PlatformStatus::Provisional => "provisional",
            PlatformStatus::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformStatus {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_determined" => Ok(PlatformStatus::NotDetermined),
            "denied" => Ok(PlatformStatus::Denied),
            "authorized" => Ok(PlatformStatus::Authorized),
            "provisional" => Ok(PlatformStatus::Provisional),
            "ephemeral" => Ok(PlatformStatus::Ephemeral),
            other => Err(PlatformError::Unavailable(format!(
                "unknown authorization status: {other}"
            ))),
        }
    }
}

/// OS permission API.
#[async_trait]
pub trait PermissionEnv: Send + Sync {
    /// Current authorization status. Never prompts.
    async fn authorization_status(&self) -> Result<PlatformStatus, PlatformError>;

    /// Present the OS consent prompt. Returns whether the user granted it.
    async fn request_authorization(
        &self,
        options: AuthorizationOptions,
    ) -> Result<bool, PlatformError>;
}

/// A notification as handed to the dispatch service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Namespaced id, `"{group}:{trigger}"` for scheduled groups.
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: PlatformTrigger,
}

/// Platform notification dispatch and storage service.
///
/// Adding a request whose id is already pending replaces it.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    async fn add(&self, request: PendingRequest) -> Result<(), PlatformError>;

    async fn remove_pending(&self, ids: &[String]);

    async fn remove_delivered(&self, ids: &[String]);

    async fn pending(&self) -> Vec<PendingRequest>;

    /// Ids of every pending request, including ones whose payload the
    /// backend can no longer decode.
    async fn pending_ids(&self) -> Vec<String> {
        self.pending()
            .await
            .into_iter()
            .map(|request| request.identifier)
            .collect()
    }

    /// Ids of notifications already presented to the user.
    async fn delivered(&self) -> Vec<String>;
}
