//! Per-node, per-step result storage.

use dashmap::DashMap;

use super::DataStep;
use crate::content::StepContent;
use crate::graph::NodeId;

/// Default number of lock shards.
pub const DEFAULT_SHARDS: usize = 16;

/// Creates a map with `shards` lock shards, rounded up to a power of two of
/// at least two.
pub(crate) fn sharded_map<K, V>(shards: usize) -> DashMap<K, V>
where
    K: Eq + std::hash::Hash,
{
    DashMap::with_shard_amount(shards.max(2).next_power_of_two())
}

/// Cache of the last output each node produced at each data step.
///
/// Entries outlive a run: a later run at the same step overwrites them, and a
/// failed invocation leaves the previous entry in place.
#[derive(Debug)]
pub struct ResultStore {
    entries: DashMap<(NodeId, DataStep), StepContent>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

impl ResultStore {
    /// Creates an empty store with the given number of shards.
    pub fn new(shards: usize) -> Self {
        Self {
            entries: sharded_map(shards),
        }
    }

    /// Returns the output of a node at a data step.
    pub fn get(&self, node: NodeId, step: DataStep) -> Option<StepContent> {
        self.entries
            .get(&(node, step))
            .map(|entry| entry.value().clone())
    }

    /// Records the output of a node at a data step, returning the previous entry.
    pub fn insert(
        &self,
        node: NodeId,
        step: DataStep,
        content: StepContent,
    ) -> Option<StepContent> {
        self.entries.insert((node, step), content)
    }

    /// Returns whether a node has an output at a data step.
    pub fn contains(&self, node: NodeId, step: DataStep) -> bool {
        self.entries.contains_key(&(node, step))
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
