use pretty_assertions::assert_eq;
use serde_json::json;
use triggerflow_model::{Entity, EntityType, HandlerDescriptor};
use triggerflow_types::{Action, EntityId};

#[test]
fn new_entity_has_no_identity() {
    let entity = Entity::new("account", json!({"name": "Acme"}));
    assert!(entity.id.is_none());
    assert_eq!(entity.get_str("/name"), Some("Acme"));
}

#[test]
fn with_id_keeps_identity() {
    let id = EntityId::new();
    let entity = Entity::with_id(id, "account", json!({}));
    assert_eq!(entity.id, Some(id));
}

#[test]
fn typed_accessors() {
    let entity = Entity::new("account", json!({"active": true, "employees": 42, "nested": {"city": "Oslo"}}));
    assert_eq!(entity.get_bool("/active"), Some(true));
    assert_eq!(entity.get_number("/employees"), Some(42.0));
    assert_eq!(entity.get_str("/nested/city"), Some("Oslo"));
    assert_eq!(entity.get_str("/missing"), None);
}

#[test]
fn set_converts_non_object_payload() {
    let mut entity = Entity::new("account", json!(null));
    entity.set("name", json!("Acme"));
    assert_eq!(entity.data, json!({"name": "Acme"}));
}

#[test]
fn errors_accumulate_and_are_not_serialized() {
    let mut entity = Entity::new("account", json!({}));
    assert!(!entity.has_errors());
    entity.add_error("duplicate name");
    entity.add_error("missing owner");
    assert_eq!(entity.errors(), ["duplicate name", "missing owner"]);

    let json = serde_json::to_value(&entity).unwrap();
    assert!(json.get("errors").is_none());
}

#[test]
fn entity_type_local_name_strips_namespace() {
    assert_eq!(EntityType::new("acme.invoice").local_name(), "invoice");
    assert_eq!(EntityType::new("account").local_name(), "account");
    assert_eq!(EntityType::new("trailing.").local_name(), "trailing.");
}

#[test]
fn descriptor_applies_only_to_its_type_and_actions() {
    let descriptor = HandlerDescriptor::new("audit", "account", [Action::AfterInsert, Action::AfterUpdate]);
    assert!(descriptor.applies_to("account", Action::AfterInsert));
    assert!(descriptor.applies_to("account", Action::AfterUpdate));
    assert!(!descriptor.applies_to("account", Action::BeforeInsert));
    assert!(!descriptor.applies_to("contact", Action::AfterInsert));
    assert!(!descriptor.clone().active(false).applies_to("account", Action::AfterInsert));
}

#[test]
fn descriptor_deserializes_with_defaults() {
    let descriptor: HandlerDescriptor = serde_json::from_value(json!({
        "class_identifier": "audit",
        "entity_type": "account",
        "actions": ["AfterInsert"],
    }))
    .unwrap();
    assert_eq!(descriptor, HandlerDescriptor::new("audit", "account", [Action::AfterInsert]));
}
