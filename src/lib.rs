pub mod commands;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;

use std::path::Path;

pub use db::{Database, KeyValueStore, MemoryStore};
pub use engine::{
    compute_position_size, compute_stats, derive_outcome, filter_by_range, sum_pnl_for_period,
};
pub use error::JournalError;

pub const DATABASE_FILE: &str = "risk_journal.db";

/// Open (creating if needed) the journal database inside `app_dir`.
pub fn open_journal(app_dir: &Path) -> Result<Database, JournalError> {
    std::fs::create_dir_all(app_dir)?;

    let db_path = app_dir.join(DATABASE_FILE);
    log::info!("Database path: {:?}", db_path);

    let db_path_str = db_path.to_str().ok_or_else(|| {
        JournalError::StorageError(format!("Database path is not valid UTF-8: {:?}", db_path))
    })?;

    match Database::new(db_path_str) {
        Ok(db) => Ok(db),
        Err(e) => {
            log::error!("Database initialization failed: {}", e);
            log::error!(
                "Backups taken before each migration are in {:?}; replace {} with the most recent one to recover",
                app_dir.join("backups"),
                DATABASE_FILE
            );
            Err(e)
        }
    }
}
