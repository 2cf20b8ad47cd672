//! Per-run execution state.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use super::progress::{NoopReporter, ProgressEvent, ProgressReporter};
use super::store::sharded_map;
use super::{DataStep, Step};
use crate::content::StepContent;
use crate::graph::NodeId;
use crate::provider::ModelDescriptor;

/// Caller-supplied options for a single run.
#[derive(Clone, Default)]
pub struct RunOptions {
    cancel: CancellationToken,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl RunOptions {
    /// Creates options with a fresh cancellation token and no reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sends progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Sends progress events to a shared reporter.
    pub fn with_shared_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Returns the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

/// State owned by one run of the engine.
///
/// Holds the resolved model descriptors and the combined-input cache, both
/// discarded when the run ends, plus the run's cancellation token and
/// progress reporter.
pub struct RunContext {
    step: Step,
    cancel: CancellationToken,
    reporter: Arc<dyn ProgressReporter>,
    descriptors: DashMap<NodeId, ModelDescriptor>,
    inputs: DashMap<(NodeId, DataStep), StepContent>,
    started_at: Instant,
}

impl RunContext {
    /// Creates the context for a run at `step`.
    pub fn new(step: Step, shards: usize, options: RunOptions) -> Self {
        Self {
            step,
            cancel: options.cancel,
            reporter: options
                .reporter
                .unwrap_or_else(|| Arc::new(NoopReporter)),
            descriptors: sharded_map(shards),
            inputs: sharded_map(shards),
            started_at: Instant::now(),
        }
    }

    /// Returns the requested step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Returns the data step content is read from and results are written to.
    pub fn data_step(&self) -> DataStep {
        self.step.data_step()
    }

    /// Returns the run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forwards a progress event to the reporter.
    pub fn report(&self, event: ProgressEvent) {
        self.reporter.report(event);
    }

    /// Returns the time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the resolved model of a node.
    pub fn descriptor(&self, node: NodeId) -> Option<ModelDescriptor> {
        self.descriptors
            .get(&node)
            .map(|entry| entry.value().clone())
    }

    /// Records the resolved model of a node.
    pub fn set_descriptor(&self, node: NodeId, descriptor: ModelDescriptor) {
        self.descriptors.insert(node, descriptor);
    }

    /// Returns the number of resolved model nodes.
    pub fn resolved_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns the cached combined input of a node for this run's step.
    pub fn cached_input(&self, node: NodeId) -> Option<StepContent> {
        self.inputs
            .get(&(node, self.data_step()))
            .map(|entry| entry.value().clone())
    }

    /// Caches the combined input of a node for this run's step.
    pub fn cache_input(&self, node: NodeId, content: StepContent) {
        self.inputs.insert((node, self.data_step()), content);
    }

    /// Drops the cached input of a node, returning whether one was cached.
    pub fn invalidate_input(&self, node: NodeId) -> bool {
        self.inputs.remove(&(node, self.data_step())).is_some()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("step", &self.step)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("resolved", &self.descriptors.len())
            .field("cached_inputs", &self.inputs.len())
            .finish_non_exhaustive()
    }
}
