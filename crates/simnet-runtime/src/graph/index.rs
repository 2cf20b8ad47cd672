//! Read-only lookup structures over a graph snapshot.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::{Connection, Node, NodeId};

/// Tracing target for graph indexing.
const TRACING_TARGET: &str = "simnet_runtime::graph";

/// Immutable snapshot of the pipeline graph, indexed for repeated lookup.
///
/// Building the index is where the snapshot is sanitized: nodes with a
/// duplicate id keep their first occurrence, and connections that reference
/// a missing node, repeat an id, or repeat a `(source, target)` pair are
/// dropped. Everything downstream can assume both endpoints exist.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    /// Nodes in snapshot order.
    nodes: Vec<Node>,
    /// Node id to position in `nodes`.
    positions: HashMap<NodeId, usize>,
    /// Valid connections in snapshot order.
    connections: Vec<Connection>,
    /// Target id to its source ids, in connection order.
    sources: HashMap<NodeId, Vec<NodeId>>,
    /// Source id to its target ids, in connection order.
    targets: HashMap<NodeId, Vec<NodeId>>,
}

impl GraphIndex {
    /// Builds an index from snapshots of the node and connection collections.
    pub fn build(
        nodes: impl IntoIterator<Item = Node>,
        connections: impl IntoIterator<Item = Connection>,
    ) -> Self {
        let mut index = Self::default();

        for node in nodes {
            match index.positions.entry(node.id) {
                Entry::Occupied(_) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        node_id = %node.id,
                        "Dropping node with duplicate id"
                    );
                }
                Entry::Vacant(entry) => {
                    entry.insert(index.nodes.len());
                    index.nodes.push(node);
                }
            }
        }

        let mut seen_ids = HashSet::new();
        let mut seen_pairs = HashSet::new();

        for connection in connections {
            if !index.contains(connection.source) || !index.contains(connection.target) {
                tracing::debug!(
                    target: TRACING_TARGET,
                    connection_id = %connection.id,
                    source = %connection.source,
                    target = %connection.target,
                    "Dropping connection with a missing endpoint"
                );
                continue;
            }

            if !seen_ids.insert(connection.id)
                || !seen_pairs.insert((connection.source, connection.target))
            {
                tracing::debug!(
                    target: TRACING_TARGET,
                    connection_id = %connection.id,
                    "Dropping duplicate connection"
                );
                continue;
            }

            index
                .sources
                .entry(connection.target)
                .or_default()
                .push(connection.source);
            index
                .targets
                .entry(connection.source)
                .or_default()
                .push(connection.target);
            index.connections.push(connection);
        }

        tracing::trace!(
            target: TRACING_TARGET,
            node_count = index.nodes.len(),
            connection_count = index.connections.len(),
            "Graph index built"
        );

        index
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of valid connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns whether the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns whether a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Returns a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.positions.get(&id).map(|&position| &self.nodes[position])
    }

    /// Returns the snapshot position of a node, used for deterministic ordering.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Returns all nodes in snapshot order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Returns all model nodes in snapshot order.
    pub fn model_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_model())
    }

    /// Returns all valid connections in snapshot order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the ids of nodes connected into `target`.
    pub fn sources_of(&self, target: NodeId) -> &[NodeId] {
        self.sources.get(&target).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the ids of nodes `source` is connected into.
    pub fn targets_of(&self, source: NodeId) -> &[NodeId] {
        self.targets.get(&source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the number of distinct connections targeting a node.
    pub fn incoming_count(&self, target: NodeId) -> usize {
        self.sources_of(target).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ModelNode, NodeRole};

    #[test]
    fn test_empty_index() {
        let index = GraphIndex::build(Vec::new(), Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.connection_count(), 0);
    }

    #[test]
    fn test_adjacency_follows_connection_order() {
        let a = Node::input("a");
        let b = Node::input("b");
        let m = Node::model("m", ModelNode::new());
        let connections = vec![Connection::new(b.id, m.id), Connection::new(a.id, m.id)];
        let (a_id, b_id, m_id) = (a.id, b.id, m.id);

        let index = GraphIndex::build(vec![a, b, m], connections);

        assert_eq!(index.sources_of(m_id), &[b_id, a_id]);
        assert_eq!(index.targets_of(a_id), &[m_id]);
        assert_eq!(index.incoming_count(m_id), 2);
        assert!(index.sources_of(a_id).is_empty());
    }

    #[test]
    fn test_dangling_connections_dropped() {
        let m = Node::model("m", ModelNode::new());
        let ghost = NodeId::new();
        let connections = vec![Connection::new(ghost, m.id), Connection::new(m.id, ghost)];
        let m_id = m.id;

        let index = GraphIndex::build(vec![m], connections);

        assert_eq!(index.connection_count(), 0);
        assert_eq!(index.incoming_count(m_id), 0);
    }

    #[test]
    fn test_duplicates_dropped() {
        let a = Node::input("a");
        let m = Node::model("m", ModelNode::new());
        let copy = Node::output("copy").with_id(m.id);
        let first = Connection::new(a.id, m.id);
        let same_id = Connection::new(m.id, a.id).with_id(first.id);
        let same_pair = Connection::new(a.id, m.id);
        let m_id = m.id;

        let index = GraphIndex::build(vec![a, m, copy], vec![first, same_id, same_pair]);

        assert_eq!(index.node_count(), 2);
        assert_eq!(index.node(m_id).map(Node::role), Some(NodeRole::Model));
        assert_eq!(index.connections(), &[first]);
    }
}
