//! Core type definitions for Triggerflow.
//!
//! This crate defines the fundamental, entity-agnostic types used throughout
//! the dispatch engine:
//! - Entity identifiers (UUID v7)
//! - Trigger actions and the flag resolver that derives them
//! - The four write operation kinds a batch can carry
//!
//! Entity payloads, write batches and handler descriptors live in
//! `triggerflow-model`.

mod action;
mod ids;
mod operation;

pub use action::{Action, Timing, TriggerFlags};
pub use ids::EntityId;
pub use operation::OperationKind;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The trigger flags do not select exactly one timing and one operation.
    #[error("invalid action state: {0}")]
    InvalidActionState(String),

    #[error("unknown action name: {0}")]
    UnknownAction(String),

    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
