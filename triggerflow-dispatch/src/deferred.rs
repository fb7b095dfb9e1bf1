//! Deferred handler execution.
//!
//! A handler configured as asynchronous does not run inside the dispatch.
//! The invoker submits a [`DeferredJob`] (record ids, not records) and the
//! [`TaskQueue`] worker later runs the handler in its own unit of work with
//! its own error capture. The dispatcher never waits for or cancels a job.

use crate::committer::{BatchCommitter, CommitResult};
use crate::error::{DispatchError, DispatchResult};
use crate::error_handler::ErrorHandler;
use crate::handler::{ExecutionContext, HandlerCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use triggerflow_model::{Entity, WriteBatch};
use triggerflow_storage::{Database, EntityStore, UnitOfWork};
use triggerflow_types::{Action, EntityId};

/// Inputs of one deferred handler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredJob {
    pub new_ids: BTreeSet<EntityId>,
    pub old_ids: BTreeSet<EntityId>,
    /// Action name, e.g. `"AfterInsert"`.
    pub action_name: String,
    pub entity_type_name: String,
    pub class_identifier: String,
}

impl DeferredJob {
    /// Builds a job from the dispatch's records. Records without identity
    /// are left out.
    pub fn from_records(
        new: &[Entity],
        old: &[Entity],
        action: Action,
        entity_type_name: &str,
        class_identifier: &str,
    ) -> Self {
        Self {
            new_ids: new.iter().filter_map(|e| e.id).collect(),
            old_ids: old.iter().filter_map(|e| e.id).collect(),
            action_name: action.name().to_string(),
            entity_type_name: entity_type_name.to_string(),
            class_identifier: class_identifier.to_string(),
        }
    }

    fn context(&self) -> String {
        format!("deferred:{}:{}", self.class_identifier, self.action_name)
    }
}

/// Accepts deferred jobs. Submission is fire-and-forget.
pub trait DeferredQueue: Send + Sync {
    fn submit(&self, job: DeferredJob) -> DispatchResult<()>;
}

/// What a deferred handler run may touch: record loading and a commit
/// with its own rollback point.
pub struct DeferredContext {
    db: Arc<Database>,
    committer: BatchCommitter,
    context: String,
}

impl DeferredContext {
    pub fn new(db: Arc<Database>, errors: Arc<ErrorHandler>, context: impl Into<String>) -> Self {
        Self {
            db,
            committer: BatchCommitter::new(errors),
            context: context.into(),
        }
    }

    /// Deferred runs never defer further.
    pub fn execution(&self) -> ExecutionContext {
        ExecutionContext::Deferred
    }

    /// Reloads the job's new and old records, in id order.
    pub fn load_records(&self, job: &DeferredJob) -> DispatchResult<(Vec<Entity>, Vec<Entity>)> {
        let conn = self.db.lock();
        let store = EntityStore::new(&conn);
        Ok((store.load_many(&job.new_ids)?, store.load_many(&job.old_ids)?))
    }

    /// Commits `batch` in a fresh unit of work.
    ///
    /// Mirrors the dispatcher: with error handling disabled, write failures
    /// keep the successful writes and are returned; any other failure undoes
    /// the whole unit.
    pub fn commit(&self, batch: WriteBatch) -> DispatchResult<CommitResult> {
        let mut conn = self.db.lock();
        let mut uow = UnitOfWork::begin(&mut conn, self.context.clone())?;
        match self.committer.commit(&mut uow, batch, &self.context) {
            Ok(result) => {
                uow.commit()?;
                Ok(result)
            }
            Err(err @ DispatchError::WriteFailures(_)) => {
                uow.commit()?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// Runs deferred jobs: resolves the handler, calls `run_deferred`, and
/// captures failures in a unit of work of its own.
#[derive(Clone)]
pub struct DeferredWorker {
    catalog: Arc<HandlerCatalog>,
    db: Arc<Database>,
    errors: Arc<ErrorHandler>,
}

impl DeferredWorker {
    pub fn new(catalog: Arc<HandlerCatalog>, db: Arc<Database>, errors: Arc<ErrorHandler>) -> Self {
        Self { catalog, db, errors }
    }

    /// Executes one job to completion on the current thread.
    pub fn execute(&self, job: &DeferredJob) {
        let context = job.context();
        let Some(handler) = self.catalog.resolve(&job.class_identifier) else {
            warn!(class_identifier = %job.class_identifier, "deferred job names an unknown handler, skipping");
            return;
        };

        debug!(
            context = %context,
            new = job.new_ids.len(),
            old = job.old_ids.len(),
            "running deferred job"
        );
        let ctx = DeferredContext::new(Arc::clone(&self.db), Arc::clone(&self.errors), context.clone());
        if let Err(err) = handler.run_deferred(job, &ctx) {
            self.capture(&err, &context);
        }
    }

    fn capture(&self, err: &DispatchError, context: &str) {
        if self.errors.is_disabled() {
            // Nobody to re-raise to.
            error!(context, error = %err, "deferred job failed");
            return;
        }
        let mut conn = self.db.lock();
        let captured = UnitOfWork::begin(&mut conn, format!("capture:{context}")).and_then(|mut uow| {
            if let Err(e) = self.errors.process_error(uow.connection(), err, context) {
                warn!(context, error = %e, "failed to persist deferred job error");
                uow.rollback()?;
            }
            uow.commit()
        });
        if let Err(e) = captured {
            warn!(context, error = %e, "failed to open unit of work for deferred job error");
        }
    }
}

/// In-process deferred queue backed by a tokio channel.
///
/// Jobs run one at a time, each on the blocking pool.
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<DeferredJob>,
    worker: JoinHandle<()>,
}

impl TaskQueue {
    /// Spawns the worker loop on the current tokio runtime.
    pub fn spawn(worker: DeferredWorker) -> Self {
        Self::spawn_on(&tokio::runtime::Handle::current(), worker)
    }

    /// Spawns the worker loop on `runtime`.
    pub fn spawn_on(runtime: &tokio::runtime::Handle, worker: DeferredWorker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = runtime.spawn(Self::run_worker(rx, worker));
        info!("deferred task queue started");
        Self { tx, worker }
    }

    async fn run_worker(mut rx: mpsc::UnboundedReceiver<DeferredJob>, worker: DeferredWorker) {
        while let Some(job) = rx.recv().await {
            let worker = worker.clone();
            let class_identifier = job.class_identifier.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || worker.execute(&job)).await {
                warn!(class_identifier = %class_identifier, "deferred job panicked: {}", e);
            }
        }
        debug!("deferred task queue drained");
    }

    /// Stops accepting jobs and waits until every submitted job has run.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!("deferred worker task ended abnormally: {}", e);
        }
        info!("deferred task queue stopped");
    }
}

impl DeferredQueue for TaskQueue {
    fn submit(&self, job: DeferredJob) -> DispatchResult<()> {
        debug!(
            class_identifier = %job.class_identifier,
            action = %job.action_name,
            "deferred job submitted"
        );
        self.tx
            .send(job)
            .map_err(|e| DispatchError::QueueClosed(format!("job for '{}' dropped", e.0.class_identifier)))
    }
}
