mod config;
pub mod database;
pub mod migrations;

pub use config::{AuthorizationConfig, Config, ConsentConfig, LoggingConfig, SchedulerConfig};
pub use database::{Database, DeliveredRow, PendingRow};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/notiplan[-dev]/` based on NOTIPLAN_ENV.
///
/// Set NOTIPLAN_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NOTIPLAN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("notiplan-dev")
    } else {
        base_dir.join("notiplan")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StorageError::DataDir(e.to_string()))?;
    Ok(dir)
}
