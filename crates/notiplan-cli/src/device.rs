//! The simulated device every command operates on: one SQLite database
//! holding consent, OS permission state and the notification queue.

use std::sync::Arc;

use notiplan_core::{
    Config, Database, GroupId, GroupScheduler, SqliteConsentEnv, SqliteNotificationCenter,
    SqlitePermissionEnv,
};

pub struct Device {
    pub db: Arc<Database>,
    pub config: Config,
    pub center: Arc<SqliteNotificationCenter>,
    pub permission: Arc<SqlitePermissionEnv>,
}

impl Device {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        Ok(Self {
            center: Arc::new(SqliteNotificationCenter::new(db.clone())),
            permission: Arc::new(SqlitePermissionEnv::new(db.clone())),
            db,
            config,
        })
    }

    /// Must be called inside the tokio runtime.
    pub fn scheduler(&self) -> GroupScheduler {
        GroupScheduler::builder(
            Arc::new(SqliteConsentEnv::new(self.db.clone())),
            self.permission.clone(),
            self.center.clone(),
        )
        .config(&self.config)
        .build()
    }
}

/// Parse a group id, rejecting the reserved separator instead of panicking.
pub fn parse_group(raw: &str) -> Result<GroupId, String> {
    if raw.contains(notiplan_core::group::ID_SEPARATOR) {
        return Err(format!("group id {raw:?} must not contain ':'"));
    }
    if raw.is_empty() {
        return Err("group id must not be empty".to_string());
    }
    Ok(GroupId::new(raw))
}
