//! SQLite storage layer for Triggerflow.
//!
//! Provides persistence for everything the dispatcher touches:
//!
//! # Architecture
//!
//! - [`Database`] owns the entity/error-log connection; every dispatch locks
//!   it once and works inside a [`UnitOfWork`] (a SQLite savepoint)
//! - [`EntityStore`] performs best-effort batched writes and reports one
//!   [`WriteResult`](triggerflow_model::WriteResult) per record
//! - [`ErrorLog`] persists captured [`ErrorRecord`](triggerflow_model::ErrorRecord)s
//! - [`HandlerConfigStore`] keeps the ordered handler configuration in a
//!   separate SQLite file so configuration edits never share a transaction
//!   with entity writes

mod database;
mod entity_store;
mod error;
mod error_log;
mod handler_store;

pub use database::{Database, UnitOfWork};
pub use entity_store::EntityStore;
pub use error::{StorageError, StorageResult};
pub use error_log::ErrorLog;
pub use handler_store::HandlerConfigStore;

/// Current time as unix millis, the timestamp unit used in every table.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
