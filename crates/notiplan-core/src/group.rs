//! Notification groups: one permission decision and one id namespace.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timeline::{Timeline, TriggerId};

/// Separator between group id and trigger id in platform notification ids.
pub const ID_SEPARATOR: char = ':';

/// Identifier of a notification group.
///
/// Never contains [`ID_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// # Panics
    /// Panics if `raw` contains `:`, which is reserved for notification ids.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        assert_valid(&raw);
        Self(raw)
    }

    /// A fresh id for an ad-hoc group.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every platform notification id in this group.
    pub fn namespace(&self) -> String {
        format!("{}{}", self.0, ID_SEPARATOR)
    }

    /// Platform notification id for one trigger: `"{group}:{trigger}"`.
    pub fn notification_id(&self, trigger: &TriggerId) -> String {
        format!("{}{}{}", self.0, ID_SEPARATOR, trigger)
    }

    /// Whether a platform notification id belongs to this group.
    pub fn owns(&self, notification_id: &str) -> bool {
        notification_id
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with(ID_SEPARATOR))
    }

    /// Re-check the separator invariant. Ids can also arrive through
    /// deserialization, which bypasses [`GroupId::new`].
    pub fn validate(&self) {
        assert_valid(&self.0);
    }
}

fn assert_valid(raw: &str) {
    assert!(
        !raw.contains(ID_SEPARATOR),
        "group id {raw:?} contains ':', which is reserved for notification ids"
    );
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Where a group's timeline must be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPreference {
    /// Materialize on the main (UI) queue.
    #[default]
    MainQueueOnly,
    /// Materialize on any worker task.
    AnyQueue,
}

/// A group of notifications scheduled under one permission decision.
///
/// Named groups are ordinary structs implementing this trait and computing
/// their timeline on demand.
#[async_trait]
pub trait NotificationGroup: Send + Sync {
    fn identifier(&self) -> &GroupId;

    fn execution_preference(&self) -> ExecutionPreference {
        ExecutionPreference::MainQueueOnly
    }

    async fn timeline(&self) -> Timeline;
}

/// A group wrapping a fixed timeline.
#[derive(Debug, Clone)]
pub struct AdHocGroup {
    id: GroupId,
    timeline: Timeline,
    preference: ExecutionPreference,
}

impl AdHocGroup {
    /// Wrap `timeline`; a random id is generated when `id` is `None`.
    pub fn new(timeline: Timeline, id: Option<GroupId>) -> Self {
        Self {
            id: id.unwrap_or_else(GroupId::random),
            timeline,
            preference: ExecutionPreference::default(),
        }
    }

    pub fn with_preference(mut self, preference: ExecutionPreference) -> Self {
        self.preference = preference;
        self
    }
}

#[async_trait]
impl NotificationGroup for AdHocGroup {
    fn identifier(&self) -> &GroupId {
        &self.id
    }

    fn execution_preference(&self) -> ExecutionPreference {
        self.preference
    }

    async fn timeline(&self) -> Timeline {
        self.timeline.clone()
    }
}
