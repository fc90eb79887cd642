//! Single-shot notification triggers.
//!
//! Triggers are produced from already-resolved dates; generating those dates
//! from recurrence rules happens elsewhere.

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::NotificationContent;
use super::request::{ContentProducer, NotificationRequest};

/// The platform-level description of when a notification fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformTrigger {
    /// Fires at a local wall-clock date and time.
    Calendar { at: NaiveDateTime, repeats: bool },
    /// Fires a fixed number of seconds after it was handed to the platform.
    TimeInterval { seconds: u64, repeats: bool },
}

impl PlatformTrigger {
    pub fn calendar(at: NaiveDateTime) -> Self {
        PlatformTrigger::Calendar { at, repeats: false }
    }

    pub fn after_seconds(seconds: u64) -> Self {
        PlatformTrigger::TimeInterval {
            seconds,
            repeats: false,
        }
    }

    pub fn repeats(&self) -> bool {
        match self {
            PlatformTrigger::Calendar { repeats, .. }
            | PlatformTrigger::TimeInterval { repeats, .. } => *repeats,
        }
    }

    /// Absolute fire time if the trigger were handed to the platform at `now`.
    ///
    /// `None` when a calendar trigger lies in the past or its local time does
    /// not exist (DST gap).
    pub fn fire_date_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            PlatformTrigger::Calendar { at, .. } => {
                let fire = Local.from_local_datetime(at).earliest()?.with_timezone(&Utc);
                (fire > now).then_some(fire)
            }
            PlatformTrigger::TimeInterval { seconds, .. } => {
                let seconds = i64::try_from(*seconds).ok()?;
                now.checked_add_signed(Duration::seconds(seconds))
            }
        }
    }
}

/// Identifier of one trigger inside a group.
///
/// Combined with the group id it forms the platform notification id
/// `"{group}:{trigger}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One future moment at which one notification fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    raw: PlatformTrigger,
    identifier: TriggerId,
}

impl Trigger {
    /// # Panics
    /// Panics if `raw` repeats; only single-shot triggers are supported.
    pub fn new(raw: PlatformTrigger, identifier: TriggerId) -> Self {
        assert!(!raw.repeats(), "repeating triggers are not supported");
        Self { raw, identifier }
    }

    pub fn raw(&self) -> &PlatformTrigger {
        &self.raw
    }

    pub fn identifier(&self) -> &TriggerId {
        &self.identifier
    }

    /// Replace the identifier, e.g. to give a trigger a stable id so a
    /// later reschedule overwrites it instead of adding a sibling.
    pub fn with_identifier(mut self, identifier: TriggerId) -> Self {
        self.identifier = identifier;
        self
    }

    /// When this trigger would fire if scheduled at `now`.
    pub fn next_fire_date(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        assert!(!self.raw.repeats(), "repeating triggers are not supported");
        self.raw.fire_date_from(now)
    }
}

/// A date already produced by the recurrence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolvedDate {
    /// Local wall-clock date and time.
    Components(NaiveDateTime),
    /// An exact instant.
    Exact(DateTime<Utc>),
}

/// The triggers of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSet {
    pub triggers: Vec<Trigger>,
}

impl TriggerSet {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(trigger: Trigger) -> Self {
        Self {
            triggers: vec![trigger],
        }
    }

    /// Build single-shot triggers with random identifiers.
    ///
    /// Dates that are not strictly after `now` are dropped. Exact instants
    /// become interval triggers measured from `now`; local components become
    /// calendar triggers.
    pub fn from_dates<I>(dates: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = ResolvedDate>,
    {
        let triggers = dates
            .into_iter()
            .filter_map(|date| {
                let raw = match date {
                    ResolvedDate::Components(at) => {
                        let raw = PlatformTrigger::calendar(at);
                        raw.fire_date_from(now)?;
                        raw
                    }
                    ResolvedDate::Exact(at) => {
                        if at <= now {
                            return None;
                        }
                        let seconds = (at - now).num_seconds().max(1);
                        PlatformTrigger::after_seconds(u64::try_from(seconds).ok()?)
                    }
                };
                Some(Trigger::new(raw, TriggerId::random()))
            })
            .collect();
        Self { triggers }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trigger> {
        self.triggers.iter()
    }

    /// Pair these triggers with fixed content.
    pub fn schedule(self, content: NotificationContent) -> NotificationRequest {
        NotificationRequest::new(self, content)
    }

    /// Pair these triggers with a content producer.
    pub fn schedule_with<P>(self, producer: P) -> NotificationRequest
    where
        P: ContentProducer + 'static,
    {
        NotificationRequest::new(self, producer)
    }
}

impl FromIterator<Trigger> for TriggerSet {
    fn from_iter<T: IntoIterator<Item = Trigger>>(iter: T) -> Self {
        Self {
            triggers: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TriggerSet {
    type Item = &'a Trigger;
    type IntoIter = std::slice::Iter<'a, Trigger>;

    fn into_iter(self) -> Self::IntoIter {
        self.triggers.iter()
    }
}
