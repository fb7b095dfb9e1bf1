//! Data model for the Triggerflow dispatch engine.
//!
//! Defines the values that flow between the orchestrator, handlers and the
//! committer:
//! - [`Entity`] — one business record (optional identity, type, JSON payload)
//! - [`EntityType`] — the entity type a dispatch runs for
//! - [`WriteBatch`] — proposed inserts/updates/deletes/undeletes from handlers
//! - [`HandlerDescriptor`] — one configured handler for a type and action set
//! - [`ErrorRecord`] / [`Errors`] / [`WriteResult`] — structured failure capture
//!
//! Nothing here touches storage; persistence lives in `triggerflow-storage`.

mod batch;
mod descriptor;
mod entity;
mod error_record;

pub use batch::WriteBatch;
pub use descriptor::HandlerDescriptor;
pub use entity::{Entity, EntityType};
pub use error_record::{ErrorRecord, Errors, WriteResult};
