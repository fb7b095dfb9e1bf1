//! Shared handlers and collaborators for dispatch tests.

#![allow(dead_code)]

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use triggerflow_dispatch::{
    DeferredJob, DeferredQueue, DispatchResult, HandlerCatalog, HandlerError, HandlerRegistry,
    TriggerHandler,
};
use triggerflow_model::{Entity, EntityType, HandlerDescriptor, WriteBatch};
use triggerflow_storage::{Database, EntityStore, HandlerConfigStore, StorageResult};
use triggerflow_types::{Action, EntityId};

/// Inserts one `audit` record per new record, tagged with its own name.
pub struct AuditHandler {
    pub name: &'static str,
}

impl TriggerHandler for AuditHandler {
    fn run(
        &self,
        new: &[Entity],
        _old: &[Entity],
        action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        let mut batch = WriteBatch::new();
        for record in new {
            batch.insert(Entity::new(
                "audit",
                json!({ "by": self.name, "action": action.name(), "of": record.id }),
            ));
        }
        Ok(batch)
    }
}

/// Always raises.
pub struct FailingHandler;

impl TriggerHandler for FailingHandler {
    fn run(
        &self,
        _new: &[Entity],
        _old: &[Entity],
        _action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        Err(HandlerError::rejected("credit limit exceeded"))
    }
}

/// Proposes no writes.
pub struct NoopHandler;

impl TriggerHandler for NoopHandler {
    fn run(
        &self,
        _new: &[Entity],
        _old: &[Entity],
        _action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        Ok(WriteBatch::new())
    }
}

/// Updates every new record's `status` to `"touched"`.
pub struct TouchHandler;

impl TriggerHandler for TouchHandler {
    fn run(
        &self,
        new: &[Entity],
        _old: &[Entity],
        _action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        let mut batch = WriteBatch::new();
        for record in new {
            let mut touched = record.clone();
            touched.set("status", json!("touched"));
            batch.update(touched);
        }
        Ok(batch)
    }
}

/// One good insert plus one insert the schema rejects.
pub struct PartlyBadHandler;

impl TriggerHandler for PartlyBadHandler {
    fn run(
        &self,
        _new: &[Entity],
        _old: &[Entity],
        _action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        let mut batch = WriteBatch::new();
        batch
            .insert(Entity::new("audit", json!({ "ok": true })))
            .insert(Entity::new("", json!({ "ok": false })));
        Ok(batch)
    }
}

/// Counts synchronous runs.
pub struct CountingHandler {
    pub runs: Arc<AtomicUsize>,
}

impl TriggerHandler for CountingHandler {
    fn run(
        &self,
        _new: &[Entity],
        _old: &[Entity],
        _action: Action,
        _entity_type: &EntityType,
    ) -> Result<WriteBatch, HandlerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(WriteBatch::new())
    }
}

/// Routes dispatcher logs to the test output; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(false)
        .compact()
        .try_init();
}

pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with("audit.first", || Box::new(AuditHandler { name: "first" }))
        .with("audit.second", || Box::new(AuditHandler { name: "second" }))
        .with("failing", || Box::new(FailingHandler))
        .with("noop", || Box::new(NoopHandler))
        .with("touch", || Box::new(TouchHandler))
        .with("partly-bad", || Box::new(PartlyBadHandler))
}

/// Queue that keeps submitted jobs for inspection.
#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<DeferredJob>>,
}

impl RecordingQueue {
    pub fn jobs(&self) -> Vec<DeferredJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl DeferredQueue for RecordingQueue {
    fn submit(&self, job: DeferredJob) -> DispatchResult<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Registry wrapper that counts how often defaults were actually inserted.
pub struct CountingRegistry {
    pub inner: HandlerConfigStore,
    pub seed_calls: AtomicUsize,
    pub seeds: AtomicUsize,
}

impl CountingRegistry {
    pub fn new(defaults: Vec<HandlerDescriptor>) -> Self {
        Self {
            inner: HandlerConfigStore::open_in_memory(defaults).unwrap(),
            seed_calls: AtomicUsize::new(0),
            seeds: AtomicUsize::new(0),
        }
    }
}

impl HandlerRegistry for CountingRegistry {
    fn is_empty(&self) -> StorageResult<bool> {
        self.inner.is_empty()
    }

    fn handlers_for(&self, entity_type: &str, action: Action) -> StorageResult<Vec<HandlerDescriptor>> {
        self.inner.handlers_for(entity_type, action)
    }

    fn seed_defaults_if_empty(&self) -> StorageResult<bool> {
        self.seed_calls.fetch_add(1, Ordering::SeqCst);
        let seeded = self.inner.seed_defaults_if_empty()?;
        if seeded {
            self.seeds.fetch_add(1, Ordering::SeqCst);
        }
        Ok(seeded)
    }
}

pub fn registry(descriptors: &[HandlerDescriptor]) -> HandlerConfigStore {
    let store = HandlerConfigStore::open_in_memory(Vec::new()).unwrap();
    for descriptor in descriptors {
        store.save(descriptor).unwrap();
    }
    store
}

/// Inserts `count` accounts and returns them with their ids.
pub fn seed_accounts(db: &Database, count: usize) -> Vec<Entity> {
    let conn = db.lock();
    let store = EntityStore::new(&conn);
    let records: Vec<_> = (0..count)
        .map(|i| Entity::new("account", json!({ "name": format!("account-{i}"), "status": "new" })))
        .collect();
    let ids: Vec<EntityId> = store
        .insert_all(&records)
        .unwrap()
        .into_iter()
        .map(|r| r.id.unwrap())
        .collect();
    store.load_many(&ids).unwrap()
}

pub fn count(db: &Database, entity_type: &str) -> usize {
    EntityStore::new(&db.lock()).count(entity_type).unwrap()
}

pub fn error_count(db: &Database) -> usize {
    triggerflow_storage::ErrorLog::new(&db.lock()).count().unwrap()
}

pub fn errors(db: &Database) -> Vec<triggerflow_model::ErrorRecord> {
    triggerflow_storage::ErrorLog::new(&db.lock()).list(100, 0).unwrap()
}
