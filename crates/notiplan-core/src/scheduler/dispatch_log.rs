//! Per-trigger outcomes of one materialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::group::GroupId;

/// What was asked of the dispatch service for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    /// Content was produced and the request added.
    Add,
    /// The producer yielded nothing; the id was removed.
    Remove,
}

/// Status of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Success,
    Failed(PlatformError),
}

/// Outcome for a single notification id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub notification_id: String,
    pub action: DispatchAction,
    pub status: DispatchStatus,
}

impl DispatchRecord {
    pub fn added(notification_id: String) -> Self {
        Self {
            notification_id,
            action: DispatchAction::Add,
            status: DispatchStatus::Success,
        }
    }

    pub fn removed(notification_id: String) -> Self {
        Self {
            notification_id,
            action: DispatchAction::Remove,
            status: DispatchStatus::Success,
        }
    }

    pub fn failed(notification_id: String, error: PlatformError) -> Self {
        Self {
            notification_id,
            action: DispatchAction::Add,
            status: DispatchStatus::Failed(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, DispatchStatus::Failed(_))
    }
}

/// Log of one group's materialization, in timeline order.
#[derive(Debug, Clone)]
pub struct DispatchLog {
    pub group: GroupId,
    pub executed_at: DateTime<Utc>,
    /// Pending ids removed before adding.
    pub purged: usize,
    pub records: Vec<DispatchRecord>,
}

impl DispatchLog {
    pub fn new(group: GroupId, purged: usize, records: Vec<DispatchRecord>) -> Self {
        Self {
            group,
            executed_at: Utc::now(),
            purged,
            records,
        }
    }

    pub fn added_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action == DispatchAction::Add && !r.is_failure())
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action == DispatchAction::Remove)
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failure()).count()
    }

    /// First failed add in timeline order.
    pub fn first_failure(&self) -> Option<&PlatformError> {
        self.records.iter().find_map(|r| match &r.status {
            DispatchStatus::Failed(e) => Some(e),
            DispatchStatus::Success => None,
        })
    }
}
