//! Dependency analysis: turning connections into a level schedule.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::graph::{GraphIndex, NodeId};

/// Tracing target for dependency analysis.
const TRACING_TARGET: &str = "simnet_runtime::analyzer";

/// Model node ids grouped by level, in ascending level order.
///
/// Nodes within a level are ordered by their position in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    levels: Vec<Vec<NodeId>>,
}

impl Schedule {
    /// Returns the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns whether the schedule has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns the nodes of a level.
    pub fn level(&self, level: usize) -> Option<&[NodeId]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    /// Returns the levels in ascending order.
    pub fn levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    /// Returns the total number of scheduled nodes.
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Iterates over `(level, nodes)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[NodeId])> {
        self.levels
            .iter()
            .enumerate()
            .map(|(level, nodes)| (level, nodes.as_slice()))
    }
}

/// A connection ignored for level assignment to break a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrokenEdge {
    /// Source of the ignored connection.
    pub source: NodeId,
    /// Target of the ignored connection, the node released from the cycle.
    pub target: NodeId,
}

/// Levels computed for the schedulable model nodes of a snapshot.
///
/// Connections between two schedulable model nodes are scheduling edges, and
/// so is every model-to-file-to-model relay: the reader of a file node runs
/// after each model writing to it. Every node is placed strictly above all of its scheduling
/// predecessors, except across the edges in [`broken_edges`](Self::broken_edges).
#[derive(Debug, Clone, Default)]
pub struct DependencyAnalysis {
    levels: HashMap<NodeId, usize>,
    schedule: Schedule,
    broken_edges: Vec<BrokenEdge>,
}

impl DependencyAnalysis {
    /// Computes levels for `schedulable` model nodes with a Kahn traversal.
    ///
    /// When the traversal stalls on a cycle, the remaining node with the
    /// fewest unresolved predecessors is released (ties go to the earliest
    /// node in the snapshot), its unresolved incoming edges are ignored and
    /// the traversal resumes. Ids missing from the index are ignored.
    pub fn analyze(index: &GraphIndex, schedulable: impl IntoIterator<Item = NodeId>) -> Self {
        let mut ordered: Vec<(usize, NodeId)> = schedulable
            .into_iter()
            .filter_map(|id| index.position(id).map(|position| (position, id)))
            .collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut graph = DiGraph::<NodeId, ()>::with_capacity(ordered.len(), 0);
        let indices: HashMap<NodeId, NodeIndex> = ordered
            .iter()
            .map(|&(_, id)| (id, graph.add_node(id)))
            .collect();

        let mut seen = HashSet::new();
        for (source, target) in scheduling_pairs(index) {
            if let (Some(&source), Some(&target)) = (indices.get(&source), indices.get(&target))
                && seen.insert((source, target))
            {
                graph.add_edge(source, target, ());
            }
        }

        let count = graph.node_count();
        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|node| graph.edges_directed(node, Direction::Incoming).count())
            .collect();
        let mut level = vec![0usize; count];
        let mut done = vec![false; count];
        let mut processed = 0;
        let mut broken_edges = Vec::new();

        let mut queue: VecDeque<NodeIndex> = graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .collect();

        while processed < count {
            let Some(node) = queue.pop_front() else {
                // Stalled: every remaining node sits on or behind a cycle.
                let Some(released) = graph
                    .node_indices()
                    .filter(|node| !done[node.index()])
                    .min_by_key(|node| (in_degree[node.index()], node.index()))
                else {
                    break;
                };

                let released_id = graph[released];
                let ignored: Vec<_> = graph
                    .edges_directed(released, Direction::Incoming)
                    .filter(|edge| !done[edge.source().index()])
                    .map(|edge| BrokenEdge {
                        source: graph[edge.source()],
                        target: released_id,
                    })
                    .collect();

                tracing::warn!(
                    target: TRACING_TARGET,
                    node_id = %released_id,
                    ignored_edges = ignored.len(),
                    level = level[released.index()],
                    "CycleDetected: releasing node from dependency cycle"
                );

                broken_edges.extend(ignored);
                in_degree[released.index()] = 0;
                queue.push_back(released);
                continue;
            };

            if done[node.index()] {
                continue;
            }
            done[node.index()] = true;
            processed += 1;

            for successor in graph.neighbors_directed(node, Direction::Outgoing) {
                let slot = successor.index();
                if done[slot] {
                    continue;
                }

                level[slot] = level[slot].max(level[node.index()] + 1);
                in_degree[slot] = in_degree[slot].saturating_sub(1);
                if in_degree[slot] == 0 {
                    queue.push_back(successor);
                }
            }
        }

        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for node in graph.node_indices() {
            let slot = level[node.index()];
            if levels.len() <= slot {
                levels.resize_with(slot + 1, Vec::new);
            }
            levels[slot].push(graph[node]);
        }
        levels.retain(|nodes| !nodes.is_empty());

        let assigned = levels
            .iter()
            .enumerate()
            .flat_map(|(slot, nodes)| nodes.iter().map(move |&id| (id, slot)))
            .collect();

        tracing::debug!(
            target: TRACING_TARGET,
            node_count = count,
            edge_count = graph.edge_count(),
            level_count = levels.len(),
            broken_edges = broken_edges.len(),
            "Dependency levels computed"
        );

        Self {
            levels: assigned,
            schedule: Schedule { levels },
            broken_edges,
        }
    }

    /// Returns the level of a node.
    pub fn level_of(&self, node: NodeId) -> Option<usize> {
        self.levels.get(&node).copied()
    }

    /// Returns the level schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Consumes the analysis, returning the schedule.
    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }

    /// Returns the connections ignored to break cycles.
    pub fn broken_edges(&self) -> &[BrokenEdge] {
        &self.broken_edges
    }

    /// Returns whether any cycle had to be broken.
    pub fn has_cycles(&self) -> bool {
        !self.broken_edges.is_empty()
    }

    /// Returns whether the levels respect every scheduling edge that was not
    /// broken.
    pub fn is_consistent(&self, index: &GraphIndex) -> bool {
        let broken: HashSet<_> = self
            .broken_edges
            .iter()
            .map(|edge| (edge.source, edge.target))
            .collect();

        scheduling_pairs(index).all(|(source_id, target_id)| {
            match (self.level_of(source_id), self.level_of(target_id)) {
                (Some(source), Some(target)) => {
                    source < target || broken.contains(&(source_id, target_id))
                }
                _ => true,
            }
        })
    }
}

/// Yields direct connections followed by the writer-reader pairs relayed
/// through file nodes.
fn scheduling_pairs(index: &GraphIndex) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
    let direct = index
        .connections()
        .iter()
        .map(|connection| (connection.source, connection.target));

    let relayed = index.nodes().filter(|node| node.is_file()).flat_map(move |file| {
        index.sources_of(file.id).iter().flat_map(move |&writer| {
            index
                .targets_of(file.id)
                .iter()
                .map(move |&reader| (writer, reader))
        })
    });

    direct.chain(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Connection, ModelNode, Node};

    fn models(count: usize) -> Vec<Node> {
        (0..count)
            .map(|i| Node::model(format!("m{i}"), ModelNode::new()))
            .collect()
    }

    fn analyze(nodes: &[Node], edges: &[(usize, usize)]) -> (GraphIndex, DependencyAnalysis) {
        let connections = edges
            .iter()
            .map(|&(source, target)| Connection::new(nodes[source].id, nodes[target].id))
            .collect::<Vec<_>>();
        let index = GraphIndex::build(nodes.to_vec(), connections);
        let ids: Vec<_> = index.model_nodes().map(|node| node.id).collect();
        let analysis = DependencyAnalysis::analyze(&index, ids);
        (index, analysis)
    }

    #[test]
    fn test_no_edges_single_level() {
        let nodes = models(3);
        let (_, analysis) = analyze(&nodes, &[]);

        assert_eq!(analysis.schedule().len(), 1);
        assert_eq!(
            analysis.schedule().level(0).unwrap(),
            &[nodes[0].id, nodes[1].id, nodes[2].id]
        );
    }

    #[test]
    fn test_longest_path_levels() {
        // m0 -> m1 -> m2, m0 -> m2, m3 independent
        let nodes = models(4);
        let (index, analysis) = analyze(&nodes, &[(0, 1), (1, 2), (0, 2)]);

        assert_eq!(analysis.level_of(nodes[0].id), Some(0));
        assert_eq!(analysis.level_of(nodes[1].id), Some(1));
        assert_eq!(analysis.level_of(nodes[2].id), Some(2));
        assert_eq!(analysis.level_of(nodes[3].id), Some(0));
        assert_eq!(analysis.schedule().level(0).unwrap(), &[nodes[0].id, nodes[3].id]);
        assert!(!analysis.has_cycles());
        assert!(analysis.is_consistent(&index));
    }

    #[test]
    fn test_input_edges_do_not_schedule() {
        let input = Node::input("camera");
        let mut nodes = models(2);
        nodes.insert(0, input);
        let (_, analysis) = analyze(&nodes, &[(0, 1), (0, 2)]);

        assert_eq!(analysis.schedule().len(), 1);
        assert_eq!(analysis.schedule().node_count(), 2);
        assert_eq!(analysis.level_of(nodes[0].id), None);
    }

    #[test]
    fn test_two_node_cycle_released() {
        let nodes = models(2);
        let (index, analysis) = analyze(&nodes, &[(0, 1), (1, 0)]);

        assert_eq!(analysis.level_of(nodes[0].id), Some(0));
        assert_eq!(analysis.level_of(nodes[1].id), Some(1));
        assert_eq!(
            analysis.broken_edges(),
            &[BrokenEdge {
                source: nodes[1].id,
                target: nodes[0].id
            }]
        );
        assert!(analysis.is_consistent(&index));
    }

    #[test]
    fn test_cycle_behind_entry_node() {
        // m0 -> m1 -> m2 -> m1
        let nodes = models(3);
        let (index, analysis) = analyze(&nodes, &[(0, 1), (1, 2), (2, 1)]);

        assert_eq!(analysis.level_of(nodes[0].id), Some(0));
        assert_eq!(analysis.level_of(nodes[1].id), Some(1));
        assert_eq!(analysis.level_of(nodes[2].id), Some(2));
        assert_eq!(analysis.broken_edges().len(), 1);
        assert!(analysis.is_consistent(&index));
    }

    #[test]
    fn test_self_loop_is_broken() {
        let nodes = models(2);
        let (_, analysis) = analyze(&nodes, &[(0, 0), (0, 1)]);

        assert_eq!(analysis.level_of(nodes[0].id), Some(0));
        assert_eq!(analysis.level_of(nodes[1].id), Some(1));
        assert!(analysis.has_cycles());
    }

    #[test]
    fn test_excluded_nodes_do_not_constrain() {
        // m1 is not schedulable, so m0 -> m1 -> m2 gives m2 no predecessor
        let nodes = models(3);
        let connections = vec![
            Connection::new(nodes[0].id, nodes[1].id),
            Connection::new(nodes[1].id, nodes[2].id),
        ];
        let index = GraphIndex::build(nodes.clone(), connections);
        let analysis = DependencyAnalysis::analyze(&index, [nodes[2].id, nodes[0].id]);

        assert_eq!(analysis.schedule().len(), 1);
        assert_eq!(analysis.schedule().level(0).unwrap(), &[nodes[0].id, nodes[2].id]);
        assert_eq!(analysis.level_of(nodes[1].id), None);
    }

    #[test]
    fn test_file_relay_orders_reader_after_writer() {
        // writer -> journal (file) -> reader
        let writer = Node::model("writer", ModelNode::new());
        let journal = Node::file("journal");
        let reader = Node::model("reader", ModelNode::new());
        let nodes = vec![reader.clone(), journal.clone(), writer.clone()];
        let (index, analysis) = analyze(&nodes, &[(2, 1), (1, 0)]);

        assert_eq!(analysis.level_of(writer.id), Some(0));
        assert_eq!(analysis.level_of(reader.id), Some(1));
        assert_eq!(analysis.level_of(journal.id), None);
        assert_eq!(analysis.schedule().len(), 2);
        assert!(analysis.is_consistent(&index));
    }

    #[test]
    fn test_file_relay_duplicates_add_one_edge() {
        // writer -> reader directly and through two files
        let nodes = vec![
            Node::model("writer", ModelNode::new()),
            Node::file("a"),
            Node::file("b"),
            Node::model("reader", ModelNode::new()),
        ];
        let (_, analysis) = analyze(&nodes, &[(0, 3), (0, 1), (1, 3), (0, 2), (2, 3)]);

        assert_eq!(analysis.level_of(nodes[0].id), Some(0));
        assert_eq!(analysis.level_of(nodes[3].id), Some(1));
        assert!(!analysis.has_cycles());
    }

    #[test]
    fn test_every_node_gets_a_level() {
        // Dense graph with several interlocking cycles.
        let nodes = models(6);
        let mut edges = Vec::new();
        for source in 0..6 {
            for target in 0..6 {
                if (source + target) % 3 != 0 {
                    edges.push((source, target));
                }
            }
        }
        let (index, analysis) = analyze(&nodes, &edges);

        assert_eq!(analysis.schedule().node_count(), 6);
        assert!(nodes.iter().all(|node| analysis.level_of(node.id).is_some()));
        assert!(analysis.is_consistent(&index));
    }
}
