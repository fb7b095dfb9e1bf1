use serde::{Deserialize, Serialize};
use triggerflow_types::EntityId;

/// A generic business record processed by the dispatcher.
///
/// The `data` field holds arbitrary JSON whose structure belongs to the
/// entity type. Records that were never inserted have no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Option<EntityId>,
    pub entity_type: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub modified_at: i64,
    #[serde(default)]
    pub is_deleted: bool,
    /// Inline errors attached while dispatching; the caller rejects the
    /// surrounding write when any are present.
    #[serde(skip)]
    errors: Vec<String>,
}

impl Entity {
    /// A record without identity, ready to be proposed for insert.
    pub fn new(entity_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: None,
            entity_type: entity_type.into(),
            data,
            created_at: 0,
            modified_at: 0,
            is_deleted: false,
            errors: Vec::new(),
        }
    }

    /// A record carrying an existing identity.
    pub fn with_id(id: EntityId, entity_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Some(id),
            ..Self::new(entity_type, data)
        }
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/name").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value from `data` using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value from `data` using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Sets a top-level field, turning `data` into an object if it is not one.
    pub fn set(&mut self, field: &str, value: serde_json::Value) {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.data.as_object_mut() {
            obj.insert(field.to_string(), value);
        }
    }

    /// Attaches a user-facing error to this record.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The entity type a dispatch runs for.
///
/// `name` may carry a namespace prefix (`acme.invoice`); handler
/// configuration is keyed by [`EntityType::local_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, local)) if !local.is_empty() => local,
            _ => &self.name,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
