//! Document data types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An accepted edit, stored exactly as the client sent it
///
/// Only `changes` is interpreted by the server. Everything else the client
/// attaches (`clientID`, `effects`, ...) is kept in `extra` and returned
/// untouched to other clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Change-set encoding (see [`crate::changes`])
    #[serde(default)]
    pub changes: Value,
    /// Client metadata carried alongside the change set
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Update {
    /// Create an update with no client metadata
    pub fn new(changes: Value) -> Self {
        Self {
            changes,
            extra: Map::new(),
        }
    }

    /// Attach a client id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.extra
            .insert("clientID".to_string(), Value::String(client_id.into()));
        self
    }

    /// Client id, if the client sent one
    pub fn client_id(&self) -> Option<&str> {
        self.extra.get("clientID").and_then(Value::as_str)
    }
}

/// Point-in-time view of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Number of accepted updates
    pub version: u64,
    /// Current text
    pub doc: String,
}
