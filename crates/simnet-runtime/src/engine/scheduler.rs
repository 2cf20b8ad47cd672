//! Level-by-level execution of model nodes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::analyzer::Schedule;
use super::progress::ProgressEvent;
use super::resolver::InputResolver;
use super::{EngineConfig, NodeOutcome, OutcomeStatus, ResultStore, RunContext, SkipReason};
use crate::content::{StepContent, classify};
use crate::error::InvocationError;
use crate::graph::{GraphIndex, Node, NodeId};
use crate::provider::{FileSink, InferenceInvoker, ModelDescriptor, Providers};

/// Tracing target for scheduling.
const TRACING_TARGET: &str = "simnet_runtime::scheduler";

/// Outcomes and counts accumulated over a run.
///
/// `skipped_count` counts every model node that did not succeed, failures
/// included; `failed_count` is the failed subset.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Final outcome of every model node.
    pub outcomes: HashMap<NodeId, NodeOutcome>,
    /// Nodes that succeeded.
    pub success_count: usize,
    /// Nodes that did not succeed.
    pub skipped_count: usize,
    /// Nodes whose invocation failed.
    pub failed_count: usize,
}

impl ScheduleReport {
    fn record(&mut self, node: NodeId, outcome: NodeOutcome) {
        match outcome.status() {
            OutcomeStatus::Succeeded => self.success_count += 1,
            OutcomeStatus::Skipped => self.skipped_count += 1,
            OutcomeStatus::Failed => {
                self.failed_count += 1;
                self.skipped_count += 1;
            }
        }
        self.outcomes.insert(node, outcome);
    }
}

/// Work prepared for one node of a level.
struct NodeTask {
    node: Node,
    level: usize,
    descriptor: ModelDescriptor,
    input: StepContent,
}

/// Shared state handed to every node task.
#[derive(Clone)]
struct TaskEnv {
    index: Arc<GraphIndex>,
    store: Arc<ResultStore>,
    context: Arc<RunContext>,
    invoker: Arc<dyn InferenceInvoker>,
    file_sink: Option<Arc<dyn FileSink>>,
}

/// Executes a level schedule against one graph snapshot.
///
/// Levels run in ascending order. Within a level every eligible node gets
/// its own task, gated by a semaphore, and the level is awaited as a whole
/// before the next one starts. Node failures never abort the run.
pub struct Scheduler {
    config: EngineConfig,
    providers: Providers,
    index: Arc<GraphIndex>,
    store: Arc<ResultStore>,
    context: Arc<RunContext>,
}

impl Scheduler {
    /// Creates a scheduler for one run.
    pub fn new(
        config: EngineConfig,
        providers: Providers,
        index: Arc<GraphIndex>,
        store: Arc<ResultStore>,
        context: Arc<RunContext>,
    ) -> Self {
        Self {
            config,
            providers,
            index,
            store,
            context,
        }
    }

    fn resolver(&self) -> InputResolver<'_> {
        InputResolver::new(&self.index, &self.store, self.providers.content())
    }

    fn env(&self) -> TaskEnv {
        TaskEnv {
            index: Arc::clone(&self.index),
            store: Arc::clone(&self.store),
            context: Arc::clone(&self.context),
            invoker: Arc::clone(self.providers.invoker()),
            file_sink: self.providers.file_sink().cloned(),
        }
    }

    /// Resolves the model of every model node once.
    ///
    /// Unresolved nodes are recorded as skipped. Returns the ids of the
    /// resolved nodes, which are the only ones scheduled.
    pub fn resolve_models(&self, report: &mut ScheduleReport) -> Vec<NodeId> {
        let mut resolved = Vec::new();

        for node in self.index.model_nodes() {
            let descriptor = node
                .as_model()
                .and_then(|model| self.providers.resolver().resolve(node, model));

            match descriptor {
                Some(descriptor) => {
                    self.context.set_descriptor(node.id, descriptor);
                    resolved.push(node.id);
                }
                None => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        node_id = %node.id,
                        name = %node.name,
                        "Skipping node without a configured model"
                    );
                    self.finish(
                        report,
                        node.id,
                        None,
                        NodeOutcome::Skipped(SkipReason::UnresolvedModel),
                    );
                }
            }
        }

        resolved
    }

    /// Resolves and caches the inputs of scheduled nodes fed only by input
    /// nodes, whose inputs cannot change during the run.
    pub fn precompute_inputs(&self, schedule: &Schedule) {
        let resolver = self.resolver();
        let mut cached = 0usize;

        for (_, nodes) in schedule.iter() {
            for &id in nodes {
                let Some(node) = self.index.node(id) else {
                    continue;
                };
                let Some(model) = node.as_model() else {
                    continue;
                };

                if resolver.is_input_fed(id)
                    && resolver.prepare(&self.context, node, model).is_ok()
                {
                    cached += 1;
                }
            }
        }

        tracing::trace!(
            target: TRACING_TARGET,
            cached,
            "Precomputed model inputs"
        );
    }

    /// Runs every level of `schedule`, recording outcomes into `report`.
    pub async fn run(&self, schedule: &Schedule, report: &mut ScheduleReport) {
        for (level, nodes) in schedule.iter() {
            if self.context.is_cancelled() {
                tracing::debug!(
                    target: TRACING_TARGET,
                    level,
                    node_count = nodes.len(),
                    "Run cancelled, not starting level"
                );
                for &id in nodes {
                    self.finish(
                        report,
                        id,
                        Some(level),
                        NodeOutcome::Skipped(SkipReason::Cancelled),
                    );
                }
                continue;
            }

            self.run_level(level, nodes, report).await;
        }
    }

    async fn run_level(&self, level: usize, nodes: &[NodeId], report: &mut ScheduleReport) {
        self.context.report(ProgressEvent::LevelStarted {
            level,
            node_count: nodes.len(),
        });
        tracing::debug!(
            target: TRACING_TARGET,
            level,
            node_count = nodes.len(),
            "Starting level"
        );

        let succeeded_before = report.success_count;
        let tasks = self.prepare_level(level, nodes, report);

        let semaphore = Arc::new(Semaphore::new(self.config.permits_for(tasks.len())));
        let handles: Vec<(NodeId, JoinHandle<NodeOutcome>)> = tasks
            .into_iter()
            .map(|task| {
                let id = task.node.id;
                let env = self.env();
                let semaphore = Arc::clone(&semaphore);
                (id, tokio::spawn(execute(env, task, semaphore)))
            })
            .collect();

        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        node_id = %id,
                        error = %err,
                        "Node task aborted"
                    );
                    let outcome = NodeOutcome::Failed(InvocationError::aborted(err.to_string()));
                    self.context.report(ProgressEvent::NodeFinished {
                        node_id: id,
                        level: Some(level),
                        status: outcome.status(),
                    });
                    outcome
                }
            };
            report.record(id, outcome);
        }

        let succeeded = report.success_count - succeeded_before;
        self.context.report(ProgressEvent::LevelCompleted { level, succeeded });
        tracing::debug!(
            target: TRACING_TARGET,
            level,
            succeeded,
            not_succeeded = nodes.len() - succeeded,
            "Level completed"
        );
    }

    /// Filters a level to eligible nodes and resolves their inputs.
    fn prepare_level(
        &self,
        level: usize,
        nodes: &[NodeId],
        report: &mut ScheduleReport,
    ) -> Vec<NodeTask> {
        let resolver = self.resolver();
        let mut tasks = Vec::with_capacity(nodes.len());

        for &id in nodes {
            let (Some(node), Some(descriptor)) = (self.index.node(id), self.context.descriptor(id))
            else {
                self.finish(
                    report,
                    id,
                    Some(level),
                    NodeOutcome::Skipped(SkipReason::UnresolvedModel),
                );
                continue;
            };
            let Some(model) = node.as_model() else {
                self.finish(
                    report,
                    id,
                    Some(level),
                    NodeOutcome::Skipped(SkipReason::UnresolvedModel),
                );
                continue;
            };

            let connected = self.index.incoming_count(id);
            let required = model.required_inputs();
            if connected < required {
                let reason = SkipReason::InsufficientInputs {
                    required,
                    available: connected,
                };
                self.finish(report, id, Some(level), NodeOutcome::Skipped(reason));
                continue;
            }

            match resolver.prepare(&self.context, node, model) {
                Ok(input) => tasks.push(NodeTask {
                    node: node.clone(),
                    level,
                    descriptor,
                    input,
                }),
                Err(reason) => {
                    self.finish(report, id, Some(level), NodeOutcome::Skipped(reason));
                }
            }
        }

        tasks
    }

    /// Records an outcome decided without running the node.
    fn finish(
        &self,
        report: &mut ScheduleReport,
        node: NodeId,
        level: Option<usize>,
        outcome: NodeOutcome,
    ) {
        if let NodeOutcome::Skipped(reason) = &outcome {
            tracing::debug!(
                target: TRACING_TARGET,
                node_id = %node,
                reason = %reason,
                "Node skipped"
            );
        }

        self.context.report(ProgressEvent::NodeFinished {
            node_id: node,
            level,
            status: outcome.status(),
        });
        report.record(node, outcome);
    }
}

/// Runs one node: waits for a permit, invokes its model and commits the
/// output. Cancellation while waiting or invoking fails the node.
async fn execute(env: TaskEnv, task: NodeTask, semaphore: Arc<Semaphore>) -> NodeOutcome {
    let cancel = env.context.cancellation().clone();
    let invocation = async {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| InvocationError::aborted("concurrency gate closed"))?;
        env.invoker.invoke(&task.descriptor, &task.input.value).await
    };

    let result = tokio::select! {
        biased;

        () = cancel.cancelled() => Err(InvocationError::cancelled()),
        result = invocation => result,
    };

    let outcome = match result {
        Ok(raw) if raw.is_empty() => NodeOutcome::Failed(InvocationError::empty_output()),
        Ok(raw) => {
            let content = StepContent::new(classify(&task.descriptor, &raw), raw);
            env.commit(&task.node, &content).await;
            NodeOutcome::Succeeded(content)
        }
        Err(err) => NodeOutcome::Failed(err),
    };

    match &outcome {
        NodeOutcome::Failed(err) => tracing::warn!(
            target: TRACING_TARGET,
            node_id = %task.node.id,
            model = task.descriptor.identifier(),
            error = %err,
            "Node invocation failed"
        ),
        _ => tracing::debug!(
            target: TRACING_TARGET,
            node_id = %task.node.id,
            model = task.descriptor.identifier(),
            "Node succeeded"
        ),
    }

    env.context.report(ProgressEvent::NodeFinished {
        node_id: task.node.id,
        level: Some(task.level),
        status: outcome.status(),
    });

    outcome
}

impl TaskEnv {
    /// Stores a node's output, invalidates the cached inputs of its
    /// dependents and appends the output to connected file nodes.
    async fn commit(&self, node: &Node, content: &StepContent) {
        let step = self.context.data_step();
        self.store.insert(node.id, step, content.clone());

        for &target in self.index.targets_of(node.id) {
            let Some(target) = self.index.node(target) else {
                continue;
            };

            if target.is_model() {
                self.context.invalidate_input(target.id);
                continue;
            }

            if !target.is_file() {
                continue;
            }

            let Some(sink) = &self.file_sink else {
                continue;
            };

            match sink.append(target, node, step, content).await {
                Ok(location) => {
                    self.store
                        .insert(target.id, step, StepContent::text(location));
                }
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        file_node = %target.id,
                        source_node = %node.id,
                        error = %err,
                        "Failed to append output to file node"
                    );
                }
            }
        }
    }
}
