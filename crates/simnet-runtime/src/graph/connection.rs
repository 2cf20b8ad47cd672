//! Directed connections between nodes.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, NodeId};

/// A directed edge from a source node to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// Node the data flows from.
    pub source: NodeId,
    /// Node the data flows into.
    pub target: NodeId,
}

impl Connection {
    /// Creates a connection with a fresh identifier.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            target,
        }
    }

    /// Replaces the connection identifier.
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    /// Returns whether this connection starts and ends at the same node.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
