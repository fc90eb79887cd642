//! A request pairs a trigger set with the function producing its content.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::content::NotificationContent;
use super::trigger::{Trigger, TriggerSet};

/// Produces the content for one trigger.
///
/// Returning `None` removes that trigger's notification instead of adding
/// it, which is how a single future occurrence is suppressed.
#[async_trait]
pub trait ContentProducer: Send + Sync {
    async fn make_content(&self, trigger: &Trigger) -> Option<NotificationContent>;
}

#[async_trait]
impl ContentProducer for NotificationContent {
    async fn make_content(&self, _trigger: &Trigger) -> Option<NotificationContent> {
        Some(self.clone())
    }
}

/// Synchronous producer built from a closure. See [`content_fn`].
pub struct FnProducer<F>(F);

#[async_trait]
impl<F> ContentProducer for FnProducer<F>
where
    F: Fn(&Trigger) -> Option<NotificationContent> + Send + Sync,
{
    async fn make_content(&self, trigger: &Trigger) -> Option<NotificationContent> {
        (self.0)(trigger)
    }
}

/// Asynchronous producer built from a closure returning a future. See
/// [`content_async`].
pub struct AsyncFnProducer<F>(F);

#[async_trait]
impl<F, Fut> ContentProducer for AsyncFnProducer<F>
where
    F: Fn(Trigger) -> Fut + Send + Sync,
    Fut: Future<Output = Option<NotificationContent>> + Send,
{
    async fn make_content(&self, trigger: &Trigger) -> Option<NotificationContent> {
        (self.0)(trigger.clone()).await
    }
}

/// Content computed synchronously from the trigger.
pub fn content_fn<F>(f: F) -> FnProducer<F>
where
    F: Fn(&Trigger) -> Option<NotificationContent> + Send + Sync,
{
    FnProducer(f)
}

/// Content computed asynchronously, e.g. fetched from a local database.
pub fn content_async<F, Fut>(f: F) -> AsyncFnProducer<F>
where
    F: Fn(Trigger) -> Fut + Send + Sync,
    Fut: Future<Output = Option<NotificationContent>> + Send,
{
    AsyncFnProducer(f)
}

/// Content computed from the date the trigger will fire.
///
/// Triggers without a future fire date yield no content.
pub fn content_for_date<F>(
    f: F,
) -> FnProducer<impl Fn(&Trigger) -> Option<NotificationContent> + Send + Sync>
where
    F: Fn(DateTime<Utc>) -> Option<NotificationContent> + Send + Sync,
{
    FnProducer(move |trigger: &Trigger| trigger.next_fire_date(Utc::now()).and_then(&f))
}

type ContentTransform = dyn Fn(&mut NotificationContent) + Send + Sync;

/// Applies a mutation to whatever an inner producer yields.
struct Transformed {
    inner: Arc<dyn ContentProducer>,
    transform: Arc<ContentTransform>,
}

#[async_trait]
impl ContentProducer for Transformed {
    async fn make_content(&self, trigger: &Trigger) -> Option<NotificationContent> {
        let mut content = self.inner.make_content(trigger).await?;
        (self.transform)(&mut content);
        Some(content)
    }
}

/// Triggers plus the function producing their content.
#[derive(Clone)]
pub struct NotificationRequest {
    triggers: TriggerSet,
    content: Arc<dyn ContentProducer>,
}

impl NotificationRequest {
    pub fn new<P>(triggers: TriggerSet, producer: P) -> Self
    where
        P: ContentProducer + 'static,
    {
        Self {
            triggers,
            content: Arc::new(producer),
        }
    }

    pub fn from_shared(triggers: TriggerSet, producer: Arc<dyn ContentProducer>) -> Self {
        Self {
            triggers,
            content: producer,
        }
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    pub fn producer(&self) -> Arc<dyn ContentProducer> {
        Arc::clone(&self.content)
    }

    pub async fn make_content(&self, trigger: &Trigger) -> Option<NotificationContent> {
        self.content.make_content(trigger).await
    }

    /// Set the category identifier on every produced content.
    pub fn with_category(self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.transform(move |content| content.category_identifier = Some(category.clone()))
    }

    /// Set the target content identifier on every produced content.
    pub fn with_target_content_id(self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.transform(move |content| content.target_content_identifier = Some(target.clone()))
    }

    fn transform<F>(self, f: F) -> Self
    where
        F: Fn(&mut NotificationContent) + Send + Sync + 'static,
    {
        Self {
            triggers: self.triggers,
            content: Arc::new(Transformed {
                inner: self.content,
                transform: Arc::new(f),
            }),
        }
    }
}

impl fmt::Debug for NotificationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRequest")
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}
