//! The handler contract and the catalog that resolves handlers by key.

use crate::deferred::{DeferredContext, DeferredJob};
use crate::error::{DispatchError, DispatchResult, HandlerError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use triggerflow_model::{Entity, EntityType, WriteBatch};
use triggerflow_types::Action;

/// A pluggable unit of business logic for one entity type.
///
/// Handlers never write directly. `run` returns the writes it wants and the
/// dispatcher commits them together with every other handler's.
pub trait TriggerHandler: Send + Sync {
    /// Runs synchronously inside the dispatch.
    fn run(
        &self,
        new: &[Entity],
        old: &[Entity],
        action: Action,
        entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError>;

    /// Runs outside the dispatch, in its own unit of work.
    ///
    /// The default reloads the records by id, calls [`TriggerHandler::run`]
    /// and commits the returned batch through `ctx`.
    fn run_deferred(&self, job: &DeferredJob, ctx: &DeferredContext) -> DispatchResult<()> {
        let action: Action = job.action_name.parse()?;
        let (new, old) = ctx.load_records(job)?;
        let entity_type = EntityType::new(job.entity_type_name.clone());
        let batch = self
            .run(&new, &old, action, &entity_type)
            .map_err(|source| DispatchError::Handler {
                class_identifier: job.class_identifier.clone(),
                source,
            })?;
        if !batch.is_empty() {
            ctx.commit(batch)?;
        }
        Ok(())
    }
}

/// Where the current code runs. Deferred execution cannot nest, so only
/// interactive dispatches may hand work to the deferred queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
    #[default]
    Interactive,
    /// Inside a deferred job.
    Deferred,
    /// Inside a bulk/batch job.
    Batch,
}

impl ExecutionContext {
    pub fn allows_deferred(&self) -> bool {
        matches!(self, ExecutionContext::Interactive)
    }
}

type HandlerFactory = Arc<dyn Fn() -> Box<dyn TriggerHandler> + Send + Sync>;

/// Maps stable class identifiers to handler factories.
///
/// Every handler the configuration may name is registered up front; an
/// identifier with no factory is a configuration error the invoker skips.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `class_identifier`, replacing any previous one.
    pub fn register<F>(&mut self, class_identifier: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn TriggerHandler> + Send + Sync + 'static,
    {
        self.factories.insert(class_identifier.into(), Arc::new(factory));
        self
    }

    /// Builder form of [`HandlerCatalog::register`].
    #[must_use]
    pub fn with<F>(mut self, class_identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn TriggerHandler> + Send + Sync + 'static,
    {
        self.register(class_identifier, factory);
        self
    }

    /// Constructs a fresh handler instance, or `None` for an unknown key.
    pub fn resolve(&self, class_identifier: &str) -> Option<Box<dyn TriggerHandler>> {
        self.factories.get(class_identifier).map(|factory| factory())
    }

    pub fn contains(&self, class_identifier: &str) -> bool {
        self.factories.contains_key(class_identifier)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("HandlerCatalog").field("handlers", &keys).finish()
    }
}
