use pretty_assertions::assert_eq;
use std::fmt;
use triggerflow_model::{ErrorRecord, Errors, WriteResult};
use triggerflow_types::{EntityId, OperationKind};

#[derive(Debug)]
struct Inner;

impl fmt::Display for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection reset")
    }
}

impl std::error::Error for Inner {}

#[derive(Debug)]
struct Outer(Inner);

impl fmt::Display for Outer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("handler failed")
    }
}

impl std::error::Error for Outer {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[test]
fn from_error_renders_source_chain() {
    let record = ErrorRecord::from_error("dispatch:account:AfterUpdate", &Outer(Inner));
    assert_eq!(record.context, "dispatch:account:AfterUpdate");
    assert_eq!(record.message, "handler failed");
    assert_eq!(record.trace, "handler failed\ncaused by: connection reset");
    assert_eq!(record.record_index, None);
    assert!(record.created_at > 0);
}

#[test]
fn from_write_failure_keeps_record_position() {
    let id = EntityId::new();
    let result = WriteResult::failure(3, Some(id), "entity not found");
    let record = ErrorRecord::from_write_failure("commit", OperationKind::Update, &result);
    assert_eq!(record.message, "entity not found");
    assert_eq!(record.record_index, Some(3));
    assert_eq!(record.entity_id, Some(id));
    assert_eq!(record.operation, Some(OperationKind::Update));
}

#[test]
fn write_result_success_flag() {
    assert!(WriteResult::success(0, EntityId::new()).is_success());
    assert!(!WriteResult::failure(0, None, "nope").is_success());
}

#[test]
fn errors_aggregate_tracks_existence() {
    let empty = Errors::from_records(Vec::new());
    assert!(!empty.errors_exist);
    assert!(empty.is_empty());

    let some = Errors::from_records(vec![ErrorRecord::new("commit", "boom")]);
    assert!(some.errors_exist);
    assert_eq!(some.len(), 1);
    assert_eq!(some.to_string(), "1 record(s) failed: boom");
}
