//! Commits an aggregate write batch under its own rollback point.

use crate::error::{DispatchError, DispatchResult};
use crate::error_handler::ErrorHandler;
use std::sync::Arc;
use tracing::{debug, warn};
use triggerflow_model::{Errors, WriteBatch, WriteResult};
use triggerflow_storage::{EntityStore, UnitOfWork};
use triggerflow_types::{EntityId, OperationKind};

/// Outcome of committing one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitResult {
    /// Per-record results, grouped by kind in commit order.
    pub results: Vec<(OperationKind, Vec<WriteResult>)>,
    pub errors: Errors,
    /// True when failures caused the whole batch to be undone.
    pub rolled_back: bool,
}

impl CommitResult {
    /// Results for one kind (empty if the kind had no records).
    pub fn results_for(&self, kind: OperationKind) -> &[WriteResult] {
        self.results
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, results)| results.as_slice())
            .unwrap_or(&[])
    }

    /// Ids assigned to inserted records, in insert order.
    pub fn inserted_ids(&self) -> Vec<EntityId> {
        if self.rolled_back {
            return Vec::new();
        }
        self.results_for(OperationKind::Insert)
            .iter()
            .filter_map(|r| r.id)
            .collect()
    }
}

/// Writes batches kind by kind with all-or-nothing semantics.
pub struct BatchCommitter {
    errors: Arc<ErrorHandler>,
}

impl BatchCommitter {
    pub fn new(errors: Arc<ErrorHandler>) -> Self {
        Self { errors }
    }

    /// Commits `batch` inside a nested boundary of `uow`.
    ///
    /// Every record of every kind is attempted. If any record fails and error
    /// handling is enabled, the nested boundary is rolled back (including the
    /// records that succeeded) and the failures are persisted through the
    /// error handler. With error handling disabled the successful writes stay
    /// and the failures are returned as [`DispatchError::WriteFailures`].
    pub fn commit(
        &self,
        uow: &mut UnitOfWork<'_>,
        batch: WriteBatch,
        context: &str,
    ) -> DispatchResult<CommitResult> {
        for (kind, records) in batch.group_by_type() {
            debug!(context, kind = %kind, count = records.len(), "committing group");
        }
        let violations = batch.identity_violations();
        if !violations.is_empty() {
            warn!(context, count = violations.len(), "batch has records with the wrong identity for their kind");
        }

        let mut point = uow.nested(format!("commit:{context}"))?;
        let mut results = Vec::with_capacity(OperationKind::ORDERED.len());
        {
            let store = EntityStore::new(point.connection());
            for (kind, records) in batch.into_groups() {
                if records.is_empty() {
                    continue;
                }
                results.push((kind, store.write(kind, &records)?));
            }
        }

        let errors = self.errors.get_errors(context, &results);
        if !errors.errors_exist {
            point.commit()?;
            return Ok(CommitResult {
                results,
                errors,
                rolled_back: false,
            });
        }

        if self.errors.is_disabled() {
            point.commit()?;
            warn!(context, failed = errors.len(), "write failures left in place, error handling disabled");
            return Err(DispatchError::WriteFailures(errors));
        }

        point.rollback()?;
        point.commit()?;
        warn!(context, failed = errors.len(), "write failures, batch rolled back");
        self.errors.process_errors(uow.connection(), &errors.records)?;
        Ok(CommitResult {
            results,
            errors,
            rolled_back: true,
        })
    }
}
