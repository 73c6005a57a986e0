use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::db::migration_runner::MigrationRunner;
use crate::db::store::{KeyValueStore, Listener, Listeners, SubscriptionId};
use crate::error::JournalError;

/// SQLite-backed store. Every record is one row of `kv_store`.
pub struct Database {
    pub conn: Mutex<Connection>,
    listeners: Listeners,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self, JournalError> {
        let conn = Connection::open(db_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::migrate(conn, db_path)
    }

    pub fn open_in_memory() -> Result<Self, JournalError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(conn, ":memory:")
    }

    fn migrate(conn: Connection, db_path: &str) -> Result<Self, JournalError> {
        let runner = MigrationRunner::new();

        log::info!("=== Starting database migration check ===");
        log::info!(
            "Current schema version: {:?}",
            runner.get_current_version(&conn)?
        );

        let applied = runner.run_pending_migrations(&conn, db_path)?;
        if applied > 0 {
            log::info!("Applied {} migrations", applied);
        } else {
            log::info!("Database schema is up to date");
        }

        runner.verify_migrations(&conn)?;
        log::info!("=== Migration check complete ===");

        Ok(Database {
            conn: Mutex::new(conn),
            listeners: Listeners::default(),
        })
    }

    /// Number of writes made to `key` since it was created, 0 when absent.
    pub fn revision(&self, key: &str) -> Result<i64, JournalError> {
        let conn = self.lock()?;
        let revision: Option<i64> = conn
            .query_row("SELECT revision FROM kv_store WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(revision.unwrap_or(0))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, JournalError> {
        self.conn
            .lock()
            .map_err(|e| JournalError::DatabaseError(e.to_string()))
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, JournalError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), JournalError> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO kv_store (key, value, revision) VALUES (?1, ?2, 1)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    revision = kv_store.revision + 1,
                    updated_at = strftime('%s', 'now')",
                params![key, value],
            )?;
        }
        log::debug!("Stored {} ({} bytes)", key, value.len());
        self.listeners.notify(key, value);
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: Listener) -> SubscriptionId {
        self.listeners.add(key, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }
}
