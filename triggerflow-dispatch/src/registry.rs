//! The handler configuration the dispatcher reads on every dispatch.

use triggerflow_model::HandlerDescriptor;
use triggerflow_storage::{HandlerConfigStore, StorageResult};
use triggerflow_types::Action;

/// Source of ordered handler descriptors.
///
/// Implementations own default seeding: `seed_defaults_if_empty` must be
/// idempotent and safe to call from concurrent dispatches.
pub trait HandlerRegistry: Send + Sync {
    fn is_empty(&self) -> StorageResult<bool>;

    /// Active descriptors for the pair, in the order they must run.
    fn handlers_for(&self, entity_type: &str, action: Action) -> StorageResult<Vec<HandlerDescriptor>>;

    /// Returns true if this call inserted the defaults.
    fn seed_defaults_if_empty(&self) -> StorageResult<bool>;
}

impl HandlerRegistry for HandlerConfigStore {
    fn is_empty(&self) -> StorageResult<bool> {
        HandlerConfigStore::is_empty(self)
    }

    fn handlers_for(&self, entity_type: &str, action: Action) -> StorageResult<Vec<HandlerDescriptor>> {
        HandlerConfigStore::handlers_for(self, entity_type, action)
    }

    fn seed_defaults_if_empty(&self) -> StorageResult<bool> {
        HandlerConfigStore::seed_defaults_if_empty(self)
    }
}
