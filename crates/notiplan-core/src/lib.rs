//! # notiplan Core Library
//!
//! Permission-aware scheduling of local notification groups. A group's
//! notifications are scheduled only after a [`PermissionStrategy`] has been
//! satisfied at two independent levels: an in-app, per-group consent and the
//! OS notification permission.
//!
//! ## Architecture
//!
//! - **Consent**: per-group consent store and the OS permission gateway
//! - **Strategy Evaluator**: interprets a strategy, group level first
//! - **Timeline**: declarative triggers plus content producers
//! - **Scheduler**: atomic clear-then-reschedule of a group's notifications
//! - **Platform**: traits for the notification center and the OS permission
//!   API, with in-memory and SQLite-backed implementations
//! - **Storage**: SQLite database and TOML configuration
//!
//! ## Key Components
//!
//! - [`GroupScheduler`]: entry point for scheduling, rescheduling and disabling
//! - [`StrategyEvaluator`]: two-level authorization state machine
//! - [`MainQueue`]: serial context for prompts and main-queue materialization
//! - [`Config`]: application configuration management

pub mod consent;
pub mod error;
pub mod evaluator;
pub mod group;
pub mod main_queue;
pub mod platform;
pub mod scheduler;
pub mod storage;
pub mod strategy;
pub mod timeline;


pub use consent::{
    AuthorizationOptions, ConsentEnv, GroupConsent, GroupConsentStore, MemoryConsentEnv,
    SqliteConsentEnv, SystemConsent, SystemConsentGateway,
};
pub use error::{AskError, ConfigError, CoreError, PlatformError, StorageError};
pub use evaluator::{PermissionResult, StrategyEvaluator};
pub use group::{AdHocGroup, ExecutionPreference, GroupId, NotificationGroup};
pub use main_queue::MainQueue;
pub use platform::{
    MemoryNotificationCenter, MemoryPermissionEnv, NotificationCenter, PendingRequest,
    PermissionEnv, PlatformStatus, SqliteNotificationCenter, SqlitePermissionEnv,
};
pub use scheduler::{
    DispatchLog, FinalAuthorizationStatus, GroupScheduler, SchedulerBuilder, SchedulingResult,
};
pub use storage::{Config, Database};
pub use strategy::{
    ask_fn, AskMode, CallbackAsker, GroupLevel, PermissionAsker, PermissionStrategy, Responder,
    SystemLevel,
};
pub use timeline::{
    content_async, content_fn, content_for_date, ContentProducer, NotificationContent,
    NotificationRequest, PlatformTrigger, ResolvedDate, Sound, Timeline, Trigger, TriggerId,
    TriggerSet,
};
