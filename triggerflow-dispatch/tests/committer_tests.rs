mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use triggerflow_dispatch::{BatchCommitter, DispatchError, ErrorHandler};
use triggerflow_model::{Entity, WriteBatch};
use triggerflow_storage::{Database, EntityStore, ErrorLog, UnitOfWork};
use triggerflow_types::{EntityId, OperationKind};

fn committer(disabled: bool) -> BatchCommitter {
    BatchCommitter::new(Arc::new(ErrorHandler::new(disabled)))
}

#[test]
fn commits_every_kind_in_order() {
    let db = Database::open_in_memory().unwrap();
    let accounts = seed_accounts(&db, 3);
    let mut conn = db.lock();
    let mut uow = UnitOfWork::begin(&mut conn, "test").unwrap();

    let mut renamed = accounts[0].clone();
    renamed.set("name", json!("renamed"));
    let mut batch = WriteBatch::new();
    batch
        .insert(Entity::new("account", json!({ "name": "fresh" })))
        .update(renamed)
        .delete(accounts[1].clone());

    let result = committer(false).commit(&mut uow, batch, "test").unwrap();
    uow.commit().unwrap();

    assert!(!result.rolled_back);
    assert!(!result.errors.errors_exist);
    let kinds: Vec<_> = result.results.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![OperationKind::Insert, OperationKind::Update, OperationKind::Delete]);

    let store = EntityStore::new(&conn);
    assert_eq!(store.count("account").unwrap(), 3);
    assert_eq!(
        store.get(&accounts[0].id.unwrap()).unwrap().unwrap().get_str("/name"),
        Some("renamed")
    );
    assert!(store.get(&accounts[1].id.unwrap()).unwrap().unwrap().is_deleted);
}

#[test]
fn any_failure_rolls_back_all_kinds_and_logs_each_failure() {
    let db = Database::open_in_memory().unwrap();
    let accounts = seed_accounts(&db, 1);
    let mut conn = db.lock();
    let mut uow = UnitOfWork::begin(&mut conn, "test").unwrap();

    let mut batch = WriteBatch::new();
    batch
        .insert(Entity::new("account", json!({ "name": "fresh" })))
        .delete(accounts[0].clone())
        .undelete(Entity::with_id(EntityId::new(), "account", json!({})))
        .update(Entity::new("account", json!({})));

    let result = committer(false).commit(&mut uow, batch, "ctx").unwrap();
    uow.commit().unwrap();

    assert!(result.rolled_back);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(
        result.errors.records.iter().map(|r| r.operation).collect::<Vec<_>>(),
        vec![Some(OperationKind::Update), Some(OperationKind::Undelete)]
    );
    assert!(result.results_for(OperationKind::Insert)[0].is_success());

    let store = EntityStore::new(&conn);
    assert_eq!(store.count("account").unwrap(), 1);
    assert!(!store.get(&accounts[0].id.unwrap()).unwrap().unwrap().is_deleted);
    let logged = ErrorLog::new(&conn).list(10, 0).unwrap();
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|r| r.context == "ctx"));
}

#[test]
fn disabled_error_handling_keeps_partial_writes() {
    let db = Database::open_in_memory().unwrap();
    let mut conn = db.lock();
    let mut uow = UnitOfWork::begin(&mut conn, "test").unwrap();

    let mut batch = WriteBatch::new();
    batch
        .insert(Entity::new("account", json!({ "name": "kept" })))
        .insert(Entity::new("", json!({})));

    let err = committer(true).commit(&mut uow, batch, "ctx").unwrap_err();
    uow.commit().unwrap();

    let DispatchError::WriteFailures(errors) = err else {
        panic!("expected write failures");
    };
    assert!(errors.errors_exist);
    assert_eq!(errors.records[0].record_index, Some(1));
    assert_eq!(EntityStore::new(&conn).count("account").unwrap(), 1);
    assert_eq!(ErrorLog::new(&conn).count().unwrap(), 0);
}

#[test]
fn outer_rollback_undoes_a_successful_commit() {
    let db = Database::open_in_memory().unwrap();
    let mut conn = db.lock();
    {
        let mut uow = UnitOfWork::begin(&mut conn, "outer").unwrap();
        let mut batch = WriteBatch::new();
        batch.insert(Entity::new("account", json!({})));
        committer(false).commit(&mut uow, batch, "ctx").unwrap();
        // Dropped without commit.
    }
    assert_eq!(EntityStore::new(&conn).count("account").unwrap(), 0);
}
