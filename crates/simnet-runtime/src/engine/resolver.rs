//! Input resolution for model nodes.

use super::combine::combine;
use super::{DataStep, ResultStore, RunContext, SkipReason};
use crate::content::{ContentType, StepContent};
use crate::graph::{GraphIndex, ModelNode, Node, NodeId, NodeKind, NodeRole};
use crate::provider::ContentStore;

/// Tracing target for input resolution.
const TRACING_TARGET: &str = "simnet_runtime::resolver";

/// Content of one connected source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    /// Source node.
    pub source: NodeId,
    /// Role of the source node.
    pub role: NodeRole,
    /// Content the source holds at the step.
    pub content: StepContent,
}

/// Gathers and combines the inputs of model nodes.
///
/// Input nodes are read from the content store. Model and file nodes are
/// read from the result store, at the same data step. Output nodes are never
/// read.
#[derive(Clone, Copy)]
pub struct InputResolver<'a> {
    index: &'a GraphIndex,
    store: &'a ResultStore,
    content: &'a dyn ContentStore,
}

impl<'a> InputResolver<'a> {
    /// Creates a resolver over a graph snapshot.
    pub fn new(
        index: &'a GraphIndex,
        store: &'a ResultStore,
        content: &'a dyn ContentStore,
    ) -> Self {
        Self {
            index,
            store,
            content,
        }
    }

    /// Returns the present inputs of `target` at `step`, in connection order.
    ///
    /// Sources without content, or with an empty value, are left out.
    pub fn resolve(&self, target: NodeId, step: DataStep) -> Vec<ResolvedInput> {
        self.index
            .sources_of(target)
            .iter()
            .filter_map(|&source| self.index.node(source))
            .filter_map(|source| {
                let content = match source.kind {
                    NodeKind::Input => self.content.content(source, step),
                    NodeKind::Model(_) | NodeKind::File => self.store.get(source.id, step),
                    NodeKind::Output => None,
                };

                let content = content.filter(StepContent::is_present);
                tracing::trace!(
                    target: TRACING_TARGET,
                    target_node = %target,
                    source_node = %source.id,
                    role = %source.role(),
                    present = content.is_some(),
                    "Resolved input"
                );

                content.map(|content| ResolvedInput {
                    source: source.id,
                    role: source.role(),
                    content,
                })
            })
            .collect()
    }

    /// Returns the input `node` is invoked with for the run's step.
    ///
    /// Uses the run's cached value when there is one. Otherwise resolves the
    /// present inputs, combines them and appends the node's classification to
    /// text input, then caches the result.
    pub fn prepare(
        &self,
        context: &RunContext,
        node: &Node,
        model: &ModelNode,
    ) -> Result<StepContent, SkipReason> {
        if let Some(cached) = context.cached_input(node.id) {
            return Ok(cached);
        }

        let inputs: Vec<_> = self
            .resolve(node.id, context.data_step())
            .into_iter()
            .map(|input| input.content)
            .collect();

        let required = model.required_inputs();
        let insufficient = SkipReason::InsufficientInputs {
            required,
            available: inputs.len(),
        };
        if inputs.len() < required {
            return Err(insufficient);
        }

        let mut combined = combine(&inputs, model.combination).ok_or(insufficient)?;
        if let Some(classification) = &model.classification
            && combined.content_type == ContentType::Text
        {
            combined.value = classification.apply(combined.value);
        }

        context.cache_input(node.id, combined.clone());
        Ok(combined)
    }

    /// Returns whether every source of `target` is an input node, so its
    /// input can be resolved before any model runs.
    pub fn is_input_fed(&self, target: NodeId) -> bool {
        let sources = self.index.sources_of(target);
        !sources.is_empty()
            && sources
                .iter()
                .filter_map(|&source| self.index.node(source))
                .all(Node::is_input)
    }
}
