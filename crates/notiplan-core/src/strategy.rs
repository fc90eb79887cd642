//! Permission strategies: which consent a group needs before scheduling.
//!
//! A [`PermissionStrategy`] combines a rule for the in-app, per-group consent
//! ([`GroupLevel`]) with a rule for the OS permission ([`SystemLevel`]). It is
//! plain data; [`StrategyEvaluator`](crate::StrategyEvaluator) interprets it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::AskError;
use crate::group::GroupId;

/// Application-supplied in-app consent prompt.
#[async_trait]
pub trait PermissionAsker: Send + Sync {
    /// Present the prompt and return whether the user agreed.
    async fn ask(&self) -> Result<bool, AskError>;
}

/// Asker built from a closure returning a future. See [`ask_fn`].
pub struct FnAsker<F>(F);

#[async_trait]
impl<F, Fut> PermissionAsker for FnAsker<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, AskError>> + Send,
{
    async fn ask(&self) -> Result<bool, AskError> {
        (self.0)().await
    }
}

pub fn ask_fn<F, Fut>(f: F) -> FnAsker<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, AskError>> + Send,
{
    FnAsker(f)
}

/// One-shot answer channel handed to a [`CallbackAsker`]'s presenter.
///
/// Consumed by answering. Dropping it unanswered reads as
/// [`AskError::Abandoned`].
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Result<bool, AskError>>,
}

impl Responder {
    pub fn respond(self, granted: bool) {
        let _ = self.tx.send(Ok(granted));
    }

    pub fn fail(self, error: AskError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Adapter for completion-callback style prompts.
///
/// The presenter shows its UI and later completes the [`Responder`], possibly
/// from another thread.
pub struct CallbackAsker<F> {
    present: F,
}

impl<F> CallbackAsker<F>
where
    F: Fn(Responder) + Send + Sync,
{
    pub fn new(present: F) -> Self {
        Self { present }
    }
}

#[async_trait]
impl<F> PermissionAsker for CallbackAsker<F>
where
    F: Fn(Responder) + Send + Sync,
{
    async fn ask(&self) -> Result<bool, AskError> {
        let (tx, rx) = oneshot::channel();
        (self.present)(Responder { tx });
        rx.await.map_err(|_| AskError::Abandoned)?
    }
}

/// When an in-app prompt may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskMode {
    /// Never ask again after a refusal.
    Once,
    /// Ask every time the group is not allowed.
    AlwaysIfNotAllowed,
}

/// Group-level rule.
#[derive(Clone)]
pub enum GroupLevel {
    /// Record the group as allowed without asking.
    AllowAutomatically,
    /// Show the in-app prompt when needed.
    AskPermission {
        mode: AskMode,
        asker: Arc<dyn PermissionAsker>,
    },
    /// Proceed only if the group was allowed before.
    IfAlreadyAllowed,
    /// Proceed only if another group was allowed before. The other id is
    /// not validated.
    IfAllowed(GroupId),
    /// Skip group-level consent entirely.
    Bypass,
}

impl GroupLevel {
    pub fn ask<A>(mode: AskMode, asker: A) -> Self
    where
        A: PermissionAsker + 'static,
    {
        GroupLevel::AskPermission {
            mode,
            asker: Arc::new(asker),
        }
    }
}

impl fmt::Debug for GroupLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupLevel::AllowAutomatically => f.write_str("AllowAutomatically"),
            GroupLevel::AskPermission { mode, .. } => f
                .debug_struct("AskPermission")
                .field("mode", mode)
                .finish_non_exhaustive(),
            GroupLevel::IfAlreadyAllowed => f.write_str("IfAlreadyAllowed"),
            GroupLevel::IfAllowed(other) => f.debug_tuple("IfAllowed").field(other).finish(),
            GroupLevel::Bypass => f.write_str("Bypass"),
        }
    }
}

/// System-level rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemLevel {
    /// Prompt through the OS if it has no decision on record.
    AskPermission,
    /// Proceed only if the OS already authorized notifications.
    IfAlreadyAllowed,
}

/// Group-level rule plus system-level rule.
#[derive(Debug, Clone)]
pub struct PermissionStrategy {
    pub group_level: GroupLevel,
    pub system_level: SystemLevel,
}

impl PermissionStrategy {
    pub fn new(group_level: GroupLevel, system_level: SystemLevel) -> Self {
        Self {
            group_level,
            system_level,
        }
    }

    /// Ask the OS when needed; no in-app consent.
    pub fn ask_permission_if_needed() -> Self {
        Self::new(GroupLevel::Bypass, SystemLevel::AskPermission)
    }

    /// Schedule only when the OS already allows it; never prompt.
    pub fn schedule_if_already_allowed() -> Self {
        Self::new(GroupLevel::Bypass, SystemLevel::IfAlreadyAllowed)
    }

    /// In-app pre-permission prompt followed by the OS prompt.
    pub fn ask_with_pre_permission<A>(mode: AskMode, asker: A) -> Self
    where
        A: PermissionAsker + 'static,
    {
        Self::new(GroupLevel::ask(mode, asker), SystemLevel::AskPermission)
    }
}
