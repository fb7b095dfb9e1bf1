//! Dispatcher configuration, read from `triggerflow.toml`.
//!
//! ```toml
//! error_handling_disabled = false
//! propagate_errors = true
//! context_tag = "dispatch"
//!
//! [[default_handlers]]
//! class_identifier = "account.audit"
//! entity_type = "account"
//! actions = ["AfterInsert", "AfterUpdate"]
//! rank = 10
//! asynchronous = true
//! ```

use crate::error::DispatchResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use triggerflow_model::HandlerDescriptor;
use triggerflow_storage::HandlerConfigStore;

/// Settings consumed by the dispatcher and its error handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// When set, failures are re-raised to the caller instead of being
    /// rolled back and persisted.
    #[serde(default)]
    pub error_handling_disabled: bool,
    /// Attach the failure message to the first affected record so the
    /// caller's own write is rejected.
    #[serde(default)]
    pub propagate_errors: bool,
    /// Prefix of the context tag on captured error records.
    #[serde(default = "default_context_tag")]
    pub context_tag: String,
    /// Descriptors seeded into an empty handler configuration store opened
    /// through [`DispatchConfig::open_handler_store`].
    #[serde(default)]
    pub default_handlers: Vec<HandlerDescriptor>,
}

fn default_context_tag() -> String {
    "dispatch".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            error_handling_disabled: false,
            propagate_errors: false,
            context_tag: default_context_tag(),
            default_handlers: Vec::new(),
        }
    }
}

impl DispatchConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml(contents: &str) -> DispatchResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Opens the handler configuration store at `path` with this
    /// configuration's `default_handlers` as its seed set.
    pub fn open_handler_store(&self, path: impl AsRef<Path>) -> DispatchResult<HandlerConfigStore> {
        Ok(HandlerConfigStore::open(path, self.default_handlers.clone())?)
    }

    pub fn open_handler_store_in_memory(&self) -> DispatchResult<HandlerConfigStore> {
        Ok(HandlerConfigStore::open_in_memory(self.default_handlers.clone())?)
    }

    /// Loads configuration from a file.
    /// Falls back to defaults with a warning when the file is missing or malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No dispatch config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => {
                    info!("Loaded dispatch config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse dispatch config {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read dispatch config {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}
