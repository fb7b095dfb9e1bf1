//! Runs one configured handler, synchronously or through the deferred queue.

use crate::deferred::{DeferredJob, DeferredQueue};
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{ExecutionContext, HandlerCatalog};
use tracing::{debug, warn};
use triggerflow_model::{Entity, EntityType, HandlerDescriptor, WriteBatch};
use triggerflow_types::Action;

/// Resolves descriptors to handlers and runs them.
pub struct HandlerInvoker<'a> {
    catalog: &'a HandlerCatalog,
    queue: Option<&'a dyn DeferredQueue>,
    execution: ExecutionContext,
}

impl<'a> HandlerInvoker<'a> {
    pub fn new(
        catalog: &'a HandlerCatalog,
        queue: Option<&'a dyn DeferredQueue>,
        execution: ExecutionContext,
    ) -> Self {
        Self {
            catalog,
            queue,
            execution,
        }
    }

    /// Invokes the handler `descriptor` names.
    ///
    /// Returns the handler's batch for a synchronous run, `None` when the
    /// handler was deferred or its identifier is unknown. Errors raised by
    /// the handler propagate.
    pub fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        new: &[Entity],
        old: &[Entity],
        action: Action,
        entity_type: &EntityType,
    ) -> DispatchResult<Option<WriteBatch>> {
        let class_identifier = descriptor.class_identifier.as_str();
        let Some(handler) = self.catalog.resolve(class_identifier) else {
            warn!(class_identifier, entity_type = %entity_type, "no handler registered under this identifier, skipping");
            return Ok(None);
        };

        if let Some(queue) = self.deferred_queue(descriptor, action) {
            let job = DeferredJob::from_records(new, old, action, &entity_type.name, class_identifier);
            queue.submit(job)?;
            debug!(class_identifier, %action, "handler deferred");
            return Ok(None);
        }

        debug!(class_identifier, %action, new = new.len(), old = old.len(), "running handler");
        let batch = handler
            .run(new, old, action, entity_type)
            .map_err(|source| DispatchError::Handler {
                class_identifier: class_identifier.to_string(),
                source,
            })?;
        Ok(Some(batch))
    }

    /// The queue to use when the descriptor may run deferred.
    ///
    /// `BeforeInsert` records have no ids to hand over, and deferred or batch
    /// contexts cannot schedule further deferred work; both fall back to a
    /// synchronous run, as does a dispatcher without a queue.
    fn deferred_queue(&self, descriptor: &HandlerDescriptor, action: Action) -> Option<&'a dyn DeferredQueue> {
        if !descriptor.asynchronous {
            return None;
        }
        if !action.records_have_identity() || !self.execution.allows_deferred() {
            debug!(
                class_identifier = %descriptor.class_identifier,
                %action,
                execution = ?self.execution,
                "asynchronous handler runs synchronously here"
            );
            return None;
        }
        if self.queue.is_none() {
            warn!(class_identifier = %descriptor.class_identifier, "no deferred queue configured, running synchronously");
        }
        self.queue
    }
}
