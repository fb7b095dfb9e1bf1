//! Turns failures into persisted error records.

use crate::error::{DispatchError, DispatchResult};
use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::{error, warn};
use triggerflow_model::{ErrorRecord, Errors, WriteResult};
use triggerflow_storage::ErrorLog;
use triggerflow_types::OperationKind;

const NOTIFY_CAPACITY: usize = 64;

/// Captures failures as [`ErrorRecord`]s.
///
/// Records are written to the error log on whatever connection the caller
/// passes, which is always the connection of the unit of work that was just
/// rolled back, and are then broadcast to subscribers. With error handling
/// disabled nothing is persisted and callers re-raise instead.
pub struct ErrorHandler {
    disabled: bool,
    notifier: broadcast::Sender<ErrorRecord>,
}

impl ErrorHandler {
    pub fn new(disabled: bool) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { disabled, notifier }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Receives every record captured from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ErrorRecord> {
        self.notifier.subscribe()
    }

    /// Captures one raised failure.
    pub fn process_error(
        &self,
        conn: &Connection,
        err: &DispatchError,
        context: &str,
    ) -> DispatchResult<ErrorRecord> {
        let record = ErrorRecord::from_error(context, err);
        error!(context, error = %err, "dispatch failed");
        self.persist(conn, std::slice::from_ref(&record))?;
        Ok(record)
    }

    /// Captures per-record write failures.
    pub fn process_errors(&self, conn: &Connection, records: &[ErrorRecord]) -> DispatchResult<()> {
        for record in records {
            warn!(
                context = %record.context,
                operation = ?record.operation,
                index = ?record.record_index,
                "record write failed: {}",
                record.message
            );
        }
        self.persist(conn, records)
    }

    fn persist(&self, conn: &Connection, records: &[ErrorRecord]) -> DispatchResult<()> {
        if self.disabled {
            return Ok(());
        }
        ErrorLog::new(conn).append_all(records)?;
        for record in records {
            // No subscribers is fine.
            let _ = self.notifier.send(record.clone());
        }
        Ok(())
    }

    /// Collects the failed entries of per-kind write results into one aggregate.
    pub fn get_errors(&self, context: &str, results: &[(OperationKind, Vec<WriteResult>)]) -> Errors {
        let records = results
            .iter()
            .flat_map(|(kind, results)| {
                results
                    .iter()
                    .filter(|r| !r.is_success())
                    .map(move |r| ErrorRecord::from_write_failure(context, *kind, r))
            })
            .collect();
        Errors::from_records(records)
    }
}
