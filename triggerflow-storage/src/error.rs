//! Storage errors.

use std::fmt::Display;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite refused a statement or the connection failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An entity payload or stored action list could not be (de)serialized.
    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A row read back from `table` does not decode.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

impl StorageError {
    pub(crate) fn corrupt(table: &'static str, reason: impl Display) -> Self {
        Self::Corrupt {
            table,
            reason: reason.to_string(),
        }
    }
}
