//! Pipeline evaluation engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::analyzer::{BrokenEdge, DependencyAnalysis};
use super::progress::ProgressEvent;
use super::scheduler::{ScheduleReport, Scheduler};
use super::{DataStep, EngineConfig, NodeOutcome, ResultStore, RunContext, RunOptions, Step};
use crate::content::StepContent;
use crate::graph::{Connection, GraphIndex, Node, NodeId};
use crate::provider::Providers;

/// Tracing target for engine operations.
const TRACING_TARGET: &str = "simnet_runtime::engine";

/// Aggregate result of one run.
#[derive(Debug)]
pub struct RunSummary {
    /// Model nodes that succeeded.
    pub success_count: usize,
    /// Model nodes that did not succeed, failures included.
    pub skipped_count: usize,
    /// Model nodes whose invocation failed.
    pub failed_count: usize,
    /// Levels in the schedule.
    pub level_count: usize,
    /// Connections ignored to break dependency cycles.
    pub broken_edges: Vec<BrokenEdge>,
    /// Final outcome of every model node.
    pub outcomes: HashMap<NodeId, NodeOutcome>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Returns `(success_count, skipped_count)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.success_count, self.skipped_count)
    }

    /// Returns the outcome of a model node.
    pub fn outcome(&self, node: NodeId) -> Option<&NodeOutcome> {
        self.outcomes.get(&node)
    }
}

/// The pipeline evaluation engine.
///
/// Evaluates every reachable model node of a graph snapshot for one step and
/// keeps the produced outputs in its [`ResultStore`] across runs.
pub struct Engine {
    config: EngineConfig,
    providers: Providers,
    store: Arc<ResultStore>,
}

impl Engine {
    /// Creates a new engine with an empty result store.
    pub fn new(config: EngineConfig, providers: Providers) -> Self {
        let store = Arc::new(ResultStore::new(config.store_shards));
        Self::with_store(config, providers, store)
    }

    /// Creates a new engine writing into an existing result store.
    pub fn with_store(config: EngineConfig, providers: Providers, store: Arc<ResultStore>) -> Self {
        tracing::info!(
            target: TRACING_TARGET,
            concurrency_factor = config.concurrency_factor,
            max_concurrency = ?config.max_concurrency,
            precompute_inputs = config.precompute_inputs,
            "Pipeline engine initialized"
        );

        Self {
            config,
            providers,
            store,
        }
    }

    /// Creates a new engine with default configuration.
    pub fn with_defaults(providers: Providers) -> Self {
        Self::new(EngineConfig::default(), providers)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the collaborators the engine runs against.
    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Returns the result store.
    pub fn results(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Returns the stored output of a node at a data step.
    pub fn get_output(&self, node: NodeId, step: impl Into<DataStep>) -> Option<StepContent> {
        self.store.get(node, step.into())
    }

    /// Evaluates every model node of the snapshot for `step`.
    pub async fn execute_all(
        &self,
        nodes: impl IntoIterator<Item = Node>,
        connections: impl IntoIterator<Item = Connection>,
        step: impl Into<Step>,
    ) -> RunSummary {
        self.execute_all_with(nodes, connections, step, RunOptions::default())
            .await
    }

    /// Evaluates every model node of the snapshot for `step`, with a
    /// cancellation token and progress reporter.
    ///
    /// Node-level problems never fail the run; they are reported in the
    /// returned summary.
    pub async fn execute_all_with(
        &self,
        nodes: impl IntoIterator<Item = Node>,
        connections: impl IntoIterator<Item = Connection>,
        step: impl Into<Step>,
        options: RunOptions,
    ) -> RunSummary {
        let step = step.into();
        let index = Arc::new(GraphIndex::build(nodes, connections));
        let context = Arc::new(RunContext::new(step, self.config.store_shards, options));
        let model_count = index.model_nodes().count();

        tracing::info!(
            target: TRACING_TARGET,
            step = step.get(),
            node_count = index.node_count(),
            model_count,
            connection_count = index.connection_count(),
            "Starting run"
        );

        let scheduler = Scheduler::new(
            self.config.clone(),
            self.providers.clone(),
            Arc::clone(&index),
            Arc::clone(&self.store),
            Arc::clone(&context),
        );

        let mut report = ScheduleReport::default();
        let resolved = scheduler.resolve_models(&mut report);
        let analysis = DependencyAnalysis::analyze(&index, resolved);
        let schedule = analysis.schedule();

        context.report(ProgressEvent::RunStarted {
            step,
            model_count,
            level_count: schedule.len(),
        });

        if self.config.precompute_inputs {
            scheduler.precompute_inputs(schedule);
        }

        scheduler.run(schedule, &mut report).await;

        let summary = RunSummary {
            success_count: report.success_count,
            skipped_count: report.skipped_count,
            failed_count: report.failed_count,
            level_count: schedule.len(),
            broken_edges: analysis.broken_edges().to_vec(),
            outcomes: report.outcomes,
            elapsed: context.elapsed(),
        };

        context.report(ProgressEvent::RunCompleted {
            success_count: summary.success_count,
            skipped_count: summary.skipped_count,
        });

        tracing::info!(
            target: TRACING_TARGET,
            step = step.get(),
            success_count = summary.success_count,
            skipped_count = summary.skipped_count,
            failed_count = summary.failed_count,
            level_count = summary.level_count,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Run completed"
        );

        summary
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("providers", &self.providers)
            .field("stored_results", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;
    use crate::engine::{EngineConfigBuilder, OutcomeStatus, SkipReason};
    use crate::graph::{CombinationMethod, ModelNode};
    use crate::provider::DirectorySink;
    use crate::provider::mock::{MemoryContentStore, MockInvoker, MockResolver, RecordingReporter};

    fn text_input(content: &MemoryContentStore, name: &str, step: u64, value: &str) -> Node {
        let node = Node::input(name);
        content.insert(node.id, DataStep::new(step), StepContent::text(value));
        node
    }

    fn engine(invoker: MockInvoker, content: MemoryContentStore) -> Engine {
        Engine::with_defaults(Providers::new(MockResolver::new(), invoker, content))
    }

    #[tokio::test]
    async fn test_chain_runs_in_dependency_order() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "I", 1, "Hello");
        let m1 = Node::model("M1", ModelNode::new());
        let m2 = Node::model("M2", ModelNode::new());
        let connections = vec![
            Connection::new(input.id, m1.id),
            Connection::new(m1.id, m2.id),
        ];
        let (m1_id, m2_id) = (m1.id, m2.id);
        let invoker = MockInvoker::echo();
        let engine = engine(invoker.clone(), content);

        let summary = engine
            .execute_all(vec![input, m1, m2], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (2, 0));
        assert_eq!(summary.level_count, 2);
        assert_eq!(engine.get_output(m1_id, DataStep::new(1)).unwrap().value, "M1: Hello");
        assert_eq!(
            engine.get_output(m2_id, DataStep::new(1)).unwrap().value,
            "M2: M1: Hello"
        );

        let first = &invoker.invocations_of("M1")[0];
        let second = &invoker.invocations_of("M2")[0];
        assert!(first.finished <= second.started);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_independent_models_run_concurrently() {
        let content = MemoryContentStore::new();
        let a = text_input(&content, "camera", 1, "frame");
        let b = text_input(&content, "mic", 1, "audio transcript");
        let left = Node::model("left", ModelNode::new());
        let right = Node::model("right", ModelNode::new());
        let connections = vec![
            Connection::new(a.id, left.id),
            Connection::new(b.id, right.id),
        ];
        let invoker = MockInvoker::echo().with_delay(Duration::from_millis(200));
        let engine = engine(invoker.clone(), content);

        let summary = engine
            .execute_all(vec![a, b, left, right], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (2, 0));
        assert_eq!(summary.level_count, 1);
        let calls = invoker.invocations();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].overlaps(&calls[1]));
    }

    #[tokio::test]
    async fn test_no_model_edges_single_level() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "text");
        let models: Vec<_> = (0..5)
            .map(|i| Node::model(format!("m{i}"), ModelNode::new()))
            .collect();
        let connections: Vec<_> = models
            .iter()
            .map(|model| Connection::new(input.id, model.id))
            .collect();
        let mut nodes = vec![input];
        nodes.extend(models);

        let summary = engine(MockInvoker::echo(), content)
            .execute_all(nodes, connections, Step::new(0))
            .await;

        assert_eq!(summary.level_count, 1);
        assert_eq!(summary.counts(), (5, 0));
    }

    #[tokio::test]
    async fn test_under_connected_ensemble_skipped() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "text");
        let ensemble = Node::model("vote", ModelNode::ensemble(2, CombinationMethod::VoteLabel));
        let connections = vec![Connection::new(input.id, ensemble.id)];
        let ensemble_id = ensemble.id;
        let invoker = MockInvoker::echo();

        let summary = engine(invoker.clone(), content)
            .execute_all(vec![input, ensemble], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (0, 1));
        assert_eq!(
            summary.outcome(ensemble_id).and_then(NodeOutcome::skip_reason),
            Some(SkipReason::InsufficientInputs {
                required: 2,
                available: 1
            })
        );
        assert!(invoker.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_ensemble_combines_inputs() {
        let content = MemoryContentStore::new();
        let a = text_input(&content, "a", 1, "foo");
        let b = text_input(&content, "b", 1, "bar");
        let ensemble = Node::model("mix", ModelNode::ensemble(2, CombinationMethod::Concatenate));
        let connections = vec![
            Connection::new(a.id, ensemble.id),
            Connection::new(b.id, ensemble.id),
        ];
        let invoker = MockInvoker::echo();

        let summary = engine(invoker.clone(), content)
            .execute_all(vec![a, b, ensemble], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (1, 0));
        assert_eq!(invoker.invocations()[0].input, "foo\n\nbar");
    }

    #[tokio::test]
    async fn test_failure_isolated_within_level() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "text");
        let broken = Node::model("broken", ModelNode::new());
        let crashing = Node::model("crashing", ModelNode::new());
        let healthy = Node::model("healthy", ModelNode::new());
        let connections = vec![
            Connection::new(input.id, broken.id),
            Connection::new(input.id, crashing.id),
            Connection::new(input.id, healthy.id),
        ];
        let (broken_id, crashing_id, healthy_id) = (broken.id, crashing.id, healthy.id);
        let invoker = MockInvoker::echo()
            .with_failure("broken")
            .with_panic("crashing");

        let summary = engine(invoker, content)
            .execute_all(vec![input, broken, crashing, healthy], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (1, 2));
        assert_eq!(summary.failed_count, 2);
        assert!(summary.outcome(healthy_id).unwrap().is_success());
        assert_eq!(summary.outcome(broken_id).unwrap().status(), OutcomeStatus::Failed);
        assert_eq!(
            summary.outcome(crashing_id).unwrap().error().map(|err| err.kind),
            Some(crate::error::InvocationErrorKind::Aborted)
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_outputs() {
        let content = MemoryContentStore::new();
        let input = Node::input("screen");
        content.insert(input.id, DataStep::new(3), StepContent::text("three"));
        content.insert(input.id, DataStep::new(4), StepContent::text("four"));
        let model = Node::model("X", ModelNode::new());
        let connections = vec![Connection::new(input.id, model.id)];
        let model_id = model.id;
        let nodes = vec![input, model];

        let store = Arc::new(ResultStore::default());
        let healthy = Engine::with_store(
            EngineConfig::default(),
            Providers::new(MockResolver::new(), MockInvoker::echo(), content.clone()),
            Arc::clone(&store),
        );
        let failing = Engine::with_store(
            EngineConfig::default(),
            Providers::new(
                MockResolver::new(),
                MockInvoker::echo().with_failure("X"),
                content,
            ),
            Arc::clone(&store),
        );

        let first = healthy
            .execute_all(nodes.clone(), connections.clone(), Step::new(2))
            .await;
        assert_eq!(first.counts(), (1, 0));

        let second = failing
            .execute_all(nodes.clone(), connections.clone(), Step::new(3))
            .await;
        assert_eq!(second.counts(), (0, 1));
        assert_eq!(healthy.get_output(model_id, DataStep::new(3)).unwrap().value, "X: three");
        assert!(healthy.get_output(model_id, DataStep::new(4)).is_none());

        let rerun = failing.execute_all(nodes, connections, Step::new(2)).await;
        assert_eq!(rerun.failed_count, 1);
        assert_eq!(failing.get_output(model_id, DataStep::new(3)).unwrap().value, "X: three");
    }

    #[tokio::test]
    async fn test_dependency_cycle_still_runs() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "text");
        let a = Node::model("a", ModelNode::new());
        let b = Node::model("b", ModelNode::new());
        let connections = vec![
            Connection::new(input.id, a.id),
            Connection::new(a.id, b.id),
            Connection::new(b.id, a.id),
        ];

        let summary = engine(MockInvoker::echo(), content)
            .execute_all(vec![input, a, b], connections, Step::new(0))
            .await;

        assert_eq!(summary.broken_edges.len(), 1);
        assert_eq!(summary.level_count, 2);
        assert_eq!(summary.counts(), (2, 0));
    }

    #[tokio::test]
    async fn test_image_output_classified() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "prompt", 1, "a cat");
        let painter = Node::model("painter", ModelNode::new());
        let captioner = Node::model("captioner", ModelNode::new());
        let connections = vec![
            Connection::new(input.id, painter.id),
            Connection::new(painter.id, captioner.id),
        ];
        let (painter_id, captioner_id) = (painter.id, captioner.id);
        let providers = Providers::new(
            MockResolver::new()
                .with_identifier("captioner", "Salesforce/blip-image-captioning-base"),
            MockInvoker::echo()
                .with_response("painter", "/tmp/out/cat.png")
                .with_response("Salesforce/blip-image-captioning-base", "/tmp/out/caption.png"),
            content,
        );
        let engine = Engine::with_defaults(providers);

        engine
            .execute_all(vec![input, painter, captioner], connections, Step::new(0))
            .await;

        let image = engine.get_output(painter_id, DataStep::new(1)).unwrap();
        assert_eq!(image.content_type, ContentType::Image);
        let caption = engine.get_output(captioner_id, DataStep::new(1)).unwrap();
        assert_eq!(caption.content_type, ContentType::Text);
    }

    #[tokio::test]
    async fn test_file_nodes_receive_output() {
        let dir = tempfile::tempdir().unwrap();
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "Hello");
        let model = Node::model("writer", ModelNode::new());
        let file = Node::file("journal");
        let connections = vec![
            Connection::new(input.id, model.id),
            Connection::new(model.id, file.id),
        ];
        let file_id = file.id;
        let providers = Providers::new(MockResolver::new(), MockInvoker::echo(), content)
            .with_file_sink(DirectorySink::in_dir(dir.path()));
        let engine = Engine::with_defaults(providers);

        let summary = engine
            .execute_all(vec![input, model, file], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (1, 0));
        let location = engine.get_output(file_id, DataStep::new(1)).unwrap();
        assert_eq!(location.content_type, ContentType::Text);
        let written = tokio::fs::read_to_string(&location.value).await.unwrap();
        assert!(written.contains("Output from Model: writer (Step 1)"));
        assert!(written.contains("writer: Hello"));
    }

    #[tokio::test]
    async fn test_file_relay_feeds_later_level() {
        let dir = tempfile::tempdir().unwrap();
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "Hello");
        let writer = Node::model("writer", ModelNode::new());
        let journal = Node::file("journal");
        let reader = Node::model("reader", ModelNode::new());
        let connections = vec![
            Connection::new(input.id, writer.id),
            Connection::new(writer.id, journal.id),
            Connection::new(journal.id, reader.id),
        ];
        let (journal_id, reader_id) = (journal.id, reader.id);
        let providers = Providers::new(MockResolver::new(), MockInvoker::echo(), content)
            .with_file_sink(DirectorySink::in_dir(dir.path()));
        let engine = Engine::with_defaults(providers);

        let summary = engine
            .execute_all(vec![input, reader, journal, writer], connections, Step::new(0))
            .await;

        assert_eq!(summary.level_count, 2);
        assert_eq!(summary.counts(), (2, 0));
        let location = engine.get_output(journal_id, DataStep::new(1)).unwrap();
        let output = engine.get_output(reader_id, DataStep::new(1)).unwrap();
        assert_eq!(output.value, format!("reader: {}", location.value));
    }

    #[tokio::test]
    async fn test_progress_events_reported() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 1, "Hello");
        let model = Node::model("m", ModelNode::new());
        let connections = vec![Connection::new(input.id, model.id)];
        let model_id = model.id;
        let reporter = RecordingReporter::new();
        let options = RunOptions::new().with_reporter(reporter.clone());
        let engine = Engine::new(
            EngineConfigBuilder::default()
                .precompute_inputs(false)
                .build()
                .unwrap(),
            Providers::new(MockResolver::new(), MockInvoker::echo(), content),
        );

        engine
            .execute_all_with(vec![input, model], connections, Step::new(0), options)
            .await;

        assert_eq!(
            reporter.events(),
            vec![
                ProgressEvent::RunStarted {
                    step: Step::new(0),
                    model_count: 1,
                    level_count: 1,
                },
                ProgressEvent::LevelStarted {
                    level: 0,
                    node_count: 1,
                },
                ProgressEvent::NodeFinished {
                    node_id: model_id,
                    level: Some(0),
                    status: OutcomeStatus::Succeeded,
                },
                ProgressEvent::LevelCompleted {
                    level: 0,
                    succeeded: 1,
                },
                ProgressEvent::RunCompleted {
                    success_count: 1,
                    skipped_count: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_input_content_skips() {
        let content = MemoryContentStore::new();
        let input = text_input(&content, "screen", 7, "later");
        let model = Node::model("m", ModelNode::new());
        let connections = vec![Connection::new(input.id, model.id)];

        let summary = engine(MockInvoker::echo(), content)
            .execute_all(vec![input, model], connections, Step::new(0))
            .await;

        assert_eq!(summary.counts(), (0, 1));
        assert_eq!(summary.failed_count, 0);
    }
}
