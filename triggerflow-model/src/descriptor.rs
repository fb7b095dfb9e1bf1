use serde::{Deserialize, Serialize};
use triggerflow_types::Action;

/// One configured handler for an entity type.
///
/// Descriptors are created and edited through the handler configuration
/// store; the dispatcher only reads them, fresh on every dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    /// Catalog key the handler factory is registered under.
    pub class_identifier: String,
    /// Local name of the entity type this handler runs for.
    pub entity_type: String,
    /// Actions the handler applies to.
    pub actions: Vec<Action>,
    /// Lower ranks run first.
    #[serde(default)]
    pub rank: i32,
    /// Request deferred execution where possible.
    #[serde(default)]
    pub asynchronous: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl HandlerDescriptor {
    pub fn new(
        class_identifier: impl Into<String>,
        entity_type: impl Into<String>,
        actions: impl IntoIterator<Item = Action>,
    ) -> Self {
        Self {
            class_identifier: class_identifier.into(),
            entity_type: entity_type.into(),
            actions: actions.into_iter().collect(),
            rank: 0,
            asynchronous: false,
            active: true,
        }
    }

    #[must_use]
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    #[must_use]
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// True when this descriptor is active and configured for the pair.
    pub fn applies_to(&self, entity_type: &str, action: Action) -> bool {
        self.active && self.entity_type == entity_type && self.actions.contains(&action)
    }
}
