//! Model descriptors returned by model resolvers.

use serde::{Deserialize, Serialize};

/// Description of the model backing a model node.
///
/// Opaque to the scheduler; only the identifier is inspected, by the output
/// classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ModelDescriptor {
    /// Creates a descriptor for the model with the given identifier,
    /// e.g. a model hub repository id.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
        }
    }

    /// Sets the human-readable model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the model identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the model name, falling back to the identifier.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}
