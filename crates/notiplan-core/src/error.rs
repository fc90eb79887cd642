//! Core error types for notiplan-core.
//!
//! Policy denials are never errors; they travel as
//! [`PermissionResult`](crate::PermissionResult) /
//! [`SchedulingResult`](crate::SchedulingResult) values. The types here cover
//! storage, configuration and platform transport failures.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for notiplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Platform notification service or permission API errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,

    /// Failed to resolve the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure talking to the platform notification service or the OS permission
/// subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The dispatch service refused a request
    #[error("Notification request '{id}' rejected: {message}")]
    Rejected { id: String, message: String },

    /// The permission subsystem could not be reached or answered with an error
    #[error("Authorization request failed: {0}")]
    Authorization(String),

    /// Backing store of a simulated platform failed
    #[error("Platform backend unavailable: {0}")]
    Unavailable(String),
}

/// Failure of an application-supplied consent prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// The prompt's responder was dropped without an answer
    #[error("Consent prompt was dismissed without an answer")]
    Abandoned,

    /// The prompt could not be presented
    #[error("Consent prompt failed: {0}")]
    Failed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<StorageError> for PlatformError {
    fn from(err: StorageError) -> Self {
        PlatformError::Unavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for PlatformError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::from(err).into()
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
