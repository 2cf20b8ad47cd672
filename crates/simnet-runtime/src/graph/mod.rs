//! Pipeline graph structures and node types.
//!
//! This module provides the graph representation consumed by the engine:
//! - [`Node`]: A vertex with a role-specific [`NodeKind`]
//! - [`ModelNode`]: Inference unit configuration, including ensembles
//! - [`Connection`]: Directed edges between nodes
//! - [`GraphIndex`]: Sanitized, indexed snapshot of nodes and connections
//! - [`NodeId`], [`ConnectionId`]: Unique identifiers

mod connection;
mod id;
mod index;
mod node;

pub use connection::Connection;
pub use id::{ConnectionId, NodeId};
pub use index::GraphIndex;
pub use node::{Classification, CombinationMethod, ModelNode, Node, NodeKind, NodeRole};
