//! Declarative description of what to schedule.
//!
//! A [`Timeline`] is an ordered list of [`NotificationRequest`]s; each request
//! pairs a [`TriggerSet`] with a [`ContentProducer`].
//!
//! ```ignore
//! let now = Utc::now();
//! let timeline = Timeline::new(vec![
//!     TriggerSet::from_dates(dates, now).schedule(NotificationContent::titled("Stretch", "")),
//! ]);
//! ```

mod content;
mod request;
mod trigger;

pub use content::{NotificationContent, Sound};
pub use request::{
    content_async, content_fn, content_for_date, AsyncFnProducer, ContentProducer, FnProducer,
    NotificationRequest,
};
pub use trigger::{PlatformTrigger, ResolvedDate, Trigger, TriggerId, TriggerSet};

/// Ordered sequence of requests.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    requests: Vec<NotificationRequest>,
}

impl Timeline {
    pub fn new(requests: Vec<NotificationRequest>) -> Self {
        Self { requests }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate timelines, preserving order.
    pub fn combine<I>(timelines: I) -> Self
    where
        I: IntoIterator<Item = Timeline>,
    {
        timelines.into_iter().flatten().collect()
    }

    pub fn push(&mut self, request: NotificationRequest) {
        self.requests.push(request);
    }

    /// Append `other` after this timeline's requests.
    pub fn then(mut self, other: Timeline) -> Self {
        self.requests.extend(other.requests);
        self
    }

    pub fn requests(&self) -> &[NotificationRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Total number of triggers across all requests.
    pub fn trigger_count(&self) -> usize {
        self.requests.iter().map(|r| r.triggers().len()).sum()
    }
}

impl From<Vec<NotificationRequest>> for Timeline {
    fn from(requests: Vec<NotificationRequest>) -> Self {
        Self::new(requests)
    }
}

impl FromIterator<NotificationRequest> for Timeline {
    fn from_iter<T: IntoIterator<Item = NotificationRequest>>(iter: T) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

impl Extend<NotificationRequest> for Timeline {
    fn extend<T: IntoIterator<Item = NotificationRequest>>(&mut self, iter: T) {
        self.requests.extend(iter);
    }
}

impl IntoIterator for Timeline {
    type Item = NotificationRequest;
    type IntoIter = std::vec::IntoIter<NotificationRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a NotificationRequest;
    type IntoIter = std::slice::Iter<'a, NotificationRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.iter()
    }
}
