use thiserror::Error;

use crate::engine::SizingError;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid stored data: {0}")]
    ParseError(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Invalid settings: {}", .0.join("; "))]
    InvalidSettings(Vec<String>),

    #[error("Unsupported record version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Sizing(#[from] SizingError),
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        JournalError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for JournalError {
    fn from(err: std::io::Error) -> Self {
        JournalError::StorageError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JournalError>;
