//! Per-client identity used to scope the push endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-run client identifier (`user_` + 8 hex chars).
///
/// Created once per scenario and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(format!("user_{}", &simple[..8]))
    }

    /// Wrap an existing identifier (e.g. one entered in the demo REPL).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
