//! SQLite-based persistence.
//!
//! Provides persistent storage for:
//! - Key-value store for per-group consent flags and simulator state
//! - Pending notification queue (upsert by id)
//! - Delivered notification list

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::StorageError;

/// A row of the pending notification queue.
///
/// `content` and `trigger` hold JSON documents; the database layer does not
/// interpret them.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRow {
    pub id: String,
    pub content: String,
    pub trigger: String,
    pub fire_at: Option<DateTime<Utc>>,
}

/// A row of the delivered notification list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredRow {
    pub id: String,
    pub content: String,
    pub delivered_at: DateTime<Utc>,
}

/// SQLite database shared by the consent store and the simulated platform.
///
/// The connection sits behind a mutex so one `Database` can be shared through
/// an `Arc` by several components.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/notiplan/notiplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("notiplan.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        migrations::migrate(&conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// List every kv pair whose key starts with `prefix`.
    pub fn kv_scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, value) = row?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    /// Insert or overwrite a pending notification.
    pub fn pending_upsert(&self, row: &PendingRow) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO pending_notifications (id, content, trigger_json, fire_at, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.id,
                row.content,
                row.trigger,
                row.fire_at.map(format_timestamp),
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// All pending notifications, ordered by fire time (unknown times last).
    pub fn pending_list(&self) -> Result<Vec<PendingRow>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, trigger_json, fire_at FROM pending_notifications
             ORDER BY fire_at IS NULL, fire_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, content, trigger, fire_at) = row?;
            out.push(PendingRow {
                id,
                content,
                trigger,
                fire_at: fire_at.as_deref().and_then(parse_timestamp),
            });
        }
        Ok(out)
    }

    /// Remove pending notifications by id. Returns how many rows were removed.
    pub fn pending_remove(&self, ids: &[String]) -> Result<usize, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute("DELETE FROM pending_notifications WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Record a delivered notification.
    pub fn delivered_insert(&self, row: &DeliveredRow) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO delivered_notifications (id, content, delivered_at)
             VALUES (?1, ?2, ?3)",
            params![row.id, row.content, format_timestamp(row.delivered_at)],
        )?;
        Ok(())
    }

    /// All delivered notifications, most recent first.
    pub fn delivered_list(&self) -> Result<Vec<DeliveredRow>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, delivered_at FROM delivered_notifications
             ORDER BY delivered_at DESC, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, content, delivered_at) = row?;
            out.push(DeliveredRow {
                id,
                content,
                delivered_at: parse_timestamp(&delivered_at).unwrap_or_default(),
            });
        }
        Ok(out)
    }

    /// Remove delivered notifications by id.
    pub fn delivered_remove(&self, ids: &[String]) -> Result<usize, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute(
                "DELETE FROM delivered_notifications WHERE id = ?1",
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Move every pending notification due at or before `now` to the
    /// delivered list. Returns the ids that were delivered.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Result<Vec<String>, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let due: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, content FROM pending_notifications
                 WHERE fire_at IS NOT NULL AND fire_at <= ?1
                 ORDER BY fire_at, id",
            )?;
            let rows = stmt.query_map(params![format_timestamp(now)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<Vec<_>, rusqlite::Error>>()?
        };

        for (id, content) in &due {
            tx.execute(
                "INSERT OR REPLACE INTO delivered_notifications (id, content, delivered_at)
                 VALUES (?1, ?2, ?3)",
                params![id, content, format_timestamp(now)],
            )?;
            tx.execute("DELETE FROM pending_notifications WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(due.into_iter().map(|(id, _)| id).collect())
    }
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
