//! Trigger handler dispatch for Triggerflow.
//!
//! A mutation event (six trigger flags, the new and old records, the entity
//! type) is turned into a single [`Action`](triggerflow_types::Action), the
//! configured handlers for that pair run in order, and their proposed writes
//! are committed together under one rollback point.
//!
//! # Architecture
//!
//! - **Dispatcher**: the state machine around one event, owning the
//!   top-level [`UnitOfWork`](triggerflow_storage::UnitOfWork)
//! - **Registry**: ordered [`HandlerDescriptor`](triggerflow_model::HandlerDescriptor)s
//!   per entity type and action, seeded with defaults on first use
//! - **Catalog**: compile-time map from class identifier to handler factory
//! - **Invoker**: runs a handler synchronously or submits a deferred job
//! - **Committer**: writes the aggregate batch kind by kind, all or nothing
//! - **Error handler**: persists failures to the error log and broadcasts them
//! - **Task queue**: runs deferred jobs on the tokio blocking pool, each in
//!   its own unit of work
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use triggerflow_dispatch::{
//!     DispatchConfig, Dispatcher, HandlerCatalog, HandlerError, TriggerEvent, TriggerHandler,
//! };
//! use triggerflow_model::{Entity, EntityType, HandlerDescriptor, WriteBatch};
//! use triggerflow_storage::{Database, HandlerConfigStore};
//! use triggerflow_types::Action;
//!
//! struct Audit;
//!
//! impl TriggerHandler for Audit {
//!     fn run(
//!         &self,
//!         new: &[Entity],
//!         _old: &[Entity],
//!         action: Action,
//!         _entity_type: &EntityType,
//!     ) -> Result<WriteBatch, HandlerError> {
//!         let mut batch = WriteBatch::new();
//!         for record in new {
//!             batch.insert(Entity::new("audit", json!({ "action": action.name(), "of": record.id })));
//!         }
//!         Ok(batch)
//!     }
//! }
//!
//! let db = Arc::new(Database::open_in_memory().unwrap());
//! let catalog = Arc::new(HandlerCatalog::new().with("account.audit", || Box::new(Audit)));
//! let registry = HandlerConfigStore::open_in_memory(Vec::new()).unwrap();
//! registry
//!     .save(&HandlerDescriptor::new("account.audit", "account", [Action::AfterInsert]))
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::new(db, catalog, DispatchConfig::default());
//! let mut event = TriggerEvent::for_action(
//!     Action::AfterInsert,
//!     EntityType::new("crm.account"),
//!     vec![Entity::new("account", json!({ "name": "Acme" }))],
//!     Vec::new(),
//! );
//! let outcome = dispatcher.dispatch(&mut event, &registry).unwrap();
//! assert!(outcome.is_success());
//! ```

mod committer;
mod config;
mod deferred;
mod dispatcher;
mod error;
mod error_handler;
mod handler;
mod invoker;
mod registry;

pub use committer::{BatchCommitter, CommitResult};
pub use config::DispatchConfig;
pub use deferred::{DeferredContext, DeferredJob, DeferredQueue, DeferredWorker, TaskQueue};
pub use dispatcher::{DispatchOutcome, DispatchState, Dispatcher, TriggerEvent};
pub use error::{DispatchError, DispatchResult, HandlerError};
pub use error_handler::ErrorHandler;
pub use handler::{ExecutionContext, HandlerCatalog, TriggerHandler};
pub use invoker::HandlerInvoker;
pub use registry::HandlerRegistry;
