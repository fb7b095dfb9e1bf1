//! Error types for the dispatch layer.

use thiserror::Error;
use triggerflow_model::Errors;
use triggerflow_storage::StorageError;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures that abort a dispatch (or a deferred job).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Trigger flags did not resolve to one action, or an action name
    /// carried by a deferred job did not parse.
    #[error("{0}")]
    Action(#[from] triggerflow_types::Error),

    /// A handler's `run` raised.
    #[error("handler '{class_identifier}' failed: {source}")]
    Handler {
        class_identifier: String,
        #[source]
        source: HandlerError,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Per-record failures left in place because error handling is disabled.
    #[error("write failures: {0}")]
    WriteFailures(Errors),

    /// The deferred queue no longer accepts jobs.
    #[error("deferred queue closed: {0}")]
    QueueClosed(String),

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Errors raised by handler business logic.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler refused the records, with a user-facing reason.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
