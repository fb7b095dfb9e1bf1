//! The dispatch orchestrator.
//!
//! One call to [`Dispatcher::dispatch`] handles one mutation event for one
//! entity type:
//!
//! ```text
//! Start ─▶ ActionResolved ─▶ HandlersLoaded ─▶ Dispatching(0..n) ─▶ Committing ─▶ Success
//!   │            │                 │                  │                  │
//!   └────────────┴─────────────────┴──────────────────┴──────────────────┴──▶ RolledBack
//! ```
//!
//! Everything after `Start` runs inside one top-level [`UnitOfWork`]. A
//! failure anywhere is caught once: the unit is rolled back and the failure
//! captured as an error record, unless error handling is disabled, in which
//! case the unit is kept and the failure returned to the caller.

use crate::committer::{BatchCommitter, CommitResult};
use crate::config::DispatchConfig;
use crate::deferred::DeferredQueue;
use crate::error::{DispatchError, DispatchResult};
use crate::error_handler::ErrorHandler;
use crate::handler::{ExecutionContext, HandlerCatalog};
use crate::invoker::HandlerInvoker;
use crate::registry::HandlerRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};
use triggerflow_model::{Entity, EntityType, ErrorRecord, WriteBatch};
use triggerflow_storage::{Database, UnitOfWork};
use triggerflow_types::{Action, TriggerFlags};

/// One mutation event as delivered by an entity trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub flags: TriggerFlags,
    /// Post-change records.
    pub new: Vec<Entity>,
    /// Pre-change records; empty on insert, aligned with `new` on update.
    pub old: Vec<Entity>,
    pub entity_type: EntityType,
}

impl TriggerEvent {
    pub fn new(flags: TriggerFlags, entity_type: EntityType, new: Vec<Entity>, old: Vec<Entity>) -> Self {
        Self {
            flags,
            new,
            old,
            entity_type,
        }
    }

    /// An event with the flags a well-formed `action` carries.
    pub fn for_action(action: Action, entity_type: EntityType, new: Vec<Entity>, old: Vec<Entity>) -> Self {
        Self::new(TriggerFlags::for_action(action), entity_type, new, old)
    }

    /// The record that receives the error message in propagation mode:
    /// first of `new`, or first of `old` when `new` is empty. Which record
    /// actually failed is not known.
    fn error_target(&mut self) -> Option<&mut Entity> {
        if self.new.is_empty() {
            self.old.first_mut()
        } else {
            self.new.first_mut()
        }
    }
}

/// Progress of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Start,
    ActionResolved(Action),
    HandlersLoaded { action: Action, count: usize },
    Dispatching { action: Action, index: usize },
    Committing { action: Action },
    Success,
    RolledBack,
}

impl DispatchState {
    /// The resolved action, once known.
    pub fn action(&self) -> Option<Action> {
        match *self {
            DispatchState::ActionResolved(action)
            | DispatchState::HandlersLoaded { action, .. }
            | DispatchState::Dispatching { action, .. }
            | DispatchState::Committing { action } => Some(action),
            _ => None,
        }
    }
}

/// How a dispatch ended when it did not return an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success {
        action: Action,
        /// Handlers that ran synchronously or were deferred.
        handlers: usize,
        /// `None` when no handler proposed any write.
        commit: Option<CommitResult>,
    },
    /// A failure was caught, the dispatch undone and the failure captured.
    RolledBack { error: ErrorRecord },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }
}

/// Runs the configured handlers for mutation events.
pub struct Dispatcher {
    db: Arc<Database>,
    catalog: Arc<HandlerCatalog>,
    config: DispatchConfig,
    errors: Arc<ErrorHandler>,
    committer: BatchCommitter,
    queue: Option<Arc<dyn DeferredQueue>>,
    execution: ExecutionContext,
}

impl Dispatcher {
    /// The error handler is built from `config`, so whether failures are
    /// captured or returned follows `config.error_handling_disabled` only.
    pub fn new(db: Arc<Database>, catalog: Arc<HandlerCatalog>, config: DispatchConfig) -> Self {
        let errors = Arc::new(ErrorHandler::new(config.error_handling_disabled));
        Self {
            db,
            catalog,
            committer: BatchCommitter::new(Arc::clone(&errors)),
            config,
            errors,
            queue: None,
            execution: ExecutionContext::Interactive,
        }
    }

    /// Enables deferred execution for asynchronous handlers.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn DeferredQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Sets the context this dispatcher runs in.
    #[must_use]
    pub fn in_context(mut self, execution: ExecutionContext) -> Self {
        self.execution = execution;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Share with a [`DeferredWorker`](crate::DeferredWorker) so deferred
    /// failures follow the same configuration.
    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// Handles one mutation event.
    ///
    /// Returns `Ok(RolledBack)` when a failure was caught and captured, and
    /// `Err` only when error handling is disabled (or the failure capture
    /// itself failed). In propagation mode a caught failure is also attached
    /// to the first affected record of `event`.
    pub fn dispatch(
        &self,
        event: &mut TriggerEvent,
        registry: &dyn HandlerRegistry,
    ) -> DispatchResult<DispatchOutcome> {
        let mut conn = self.db.lock();
        let mut state = DispatchState::Start;
        let mut uow = UnitOfWork::begin(&mut conn, self.context_tag(&event.entity_type, None))?;

        match self.run(&mut uow, event, registry, &mut state) {
            Ok(outcome) => {
                uow.commit()?;
                Ok(outcome)
            }
            Err(err) => self.fail(uow, event, err, state),
        }
    }

    fn run(
        &self,
        uow: &mut UnitOfWork<'_>,
        event: &TriggerEvent,
        registry: &dyn HandlerRegistry,
        state: &mut DispatchState,
    ) -> DispatchResult<DispatchOutcome> {
        let action = event.flags.resolve()?;
        self.advance(state, DispatchState::ActionResolved(action));

        if registry.is_empty()? && registry.seed_defaults_if_empty()? {
            info!(entity_type = %event.entity_type, "handler configuration seeded with defaults");
        }
        let descriptors = registry.handlers_for(event.entity_type.local_name(), action)?;
        self.advance(state, DispatchState::HandlersLoaded {
            action,
            count: descriptors.len(),
        });

        let invoker = HandlerInvoker::new(&self.catalog, self.queue.as_deref(), self.execution);
        let mut aggregate = WriteBatch::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            self.advance(state, DispatchState::Dispatching { action, index });
            if let Some(batch) = invoker.invoke(descriptor, &event.new, &event.old, action, &event.entity_type)? {
                aggregate.merge(batch);
            }
        }

        let commit = if aggregate.is_empty() {
            None
        } else {
            self.advance(state, DispatchState::Committing { action });
            let context = self.context_tag(&event.entity_type, Some(action));
            Some(self.committer.commit(uow, aggregate, &context)?)
        };

        self.advance(state, DispatchState::Success);
        Ok(DispatchOutcome::Success {
            action,
            handlers: descriptors.len(),
            commit,
        })
    }

    fn fail(
        &self,
        mut uow: UnitOfWork<'_>,
        event: &mut TriggerEvent,
        err: DispatchError,
        state: DispatchState,
    ) -> DispatchResult<DispatchOutcome> {
        let context = self.context_tag(&event.entity_type, state.action());

        if self.errors.is_disabled() {
            warn!(context = %context, state = ?state, error = %err, "dispatch failed, error handling disabled");
            uow.commit()?;
            return Err(err);
        }

        uow.rollback()?;
        let record = self.errors.process_error(uow.connection(), &err, &context)?;
        uow.commit()?;
        debug!(context = %context, from = ?state, "dispatch rolled back");

        if self.config.propagate_errors {
            if let Some(target) = event.error_target() {
                target.add_error(err.to_string());
            }
        }
        Ok(DispatchOutcome::RolledBack { error: record })
    }

    fn advance(&self, state: &mut DispatchState, next: DispatchState) {
        debug!(from = ?*state, to = ?next, "dispatch state");
        *state = next;
    }

    /// `dispatch:account` before the action is known, `dispatch:account:AfterUpdate` after.
    fn context_tag(&self, entity_type: &EntityType, action: Option<Action>) -> String {
        match action {
            Some(action) => format!("{}:{}:{}", self.config.context_tag, entity_type.name, action),
            None => format!("{}:{}", self.config.context_tag, entity_type.name),
        }
    }
}
