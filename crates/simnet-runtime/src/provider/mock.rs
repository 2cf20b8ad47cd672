//! Mock collaborators for testing.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! simnet-runtime = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use simnet_runtime::provider::Providers;
//! use simnet_runtime::provider::mock::{MemoryContentStore, MockInvoker, MockResolver};
//!
//! let content = MemoryContentStore::new();
//! content.insert(camera.id, DataStep::new(1), StepContent::text("Hello"));
//!
//! let providers = Providers::new(MockResolver::new(), MockInvoker::echo(), content);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::{ContentStore, InferenceInvoker, ModelDescriptor, ModelResolver};
use crate::content::StepContent;
use crate::engine::{DataStep, ProgressEvent, ProgressReporter};
use crate::error::InvocationError;
use crate::graph::{ModelNode, Node, NodeId};

/// Resolver backing every model node with a descriptor named after the node.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    unresolved: HashSet<String>,
    identifiers: HashMap<String, String>,
}

impl MockResolver {
    /// Creates a resolver that resolves every model node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves nodes with the given name unresolved.
    pub fn without_model(mut self, node_name: impl Into<String>) -> Self {
        self.unresolved.insert(node_name.into());
        self
    }

    /// Resolves nodes with the given name to `identifier` instead of their name.
    pub fn with_identifier(
        mut self,
        node_name: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        self.identifiers.insert(node_name.into(), identifier.into());
        self
    }
}

impl ModelResolver for MockResolver {
    fn resolve(&self, node: &Node, _model: &ModelNode) -> Option<ModelDescriptor> {
        if self.unresolved.contains(&node.name) {
            return None;
        }

        let identifier = self
            .identifiers
            .get(&node.name)
            .cloned()
            .unwrap_or_else(|| node.name.clone());

        Some(ModelDescriptor::new(identifier).with_name(node.name.clone()))
    }
}

/// A completed call to [`MockInvoker`].
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Identifier of the invoked model.
    pub identifier: String,
    /// Input the model was invoked with.
    pub input: String,
    /// When the call started.
    pub started: Instant,
    /// When the call returned.
    pub finished: Instant,
}

impl Invocation {
    /// Returns whether this call overlapped `other` in time.
    pub fn overlaps(&self, other: &Invocation) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

/// Invoker answering with `"{identifier}: {input}"` unless configured
/// otherwise per model identifier.
///
/// Clones share the recorded invocations.
#[derive(Debug, Clone, Default)]
pub struct MockInvoker {
    responses: HashMap<String, String>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl MockInvoker {
    /// Creates an invoker echoing its input behind the model identifier.
    pub fn echo() -> Self {
        Self::default()
    }

    /// Returns a fixed output for the model.
    pub fn with_response(
        mut self,
        identifier: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.responses.insert(identifier.into(), output.into());
        self
    }

    /// Fails every invocation of the model with a backend error.
    pub fn with_failure(mut self, identifier: impl Into<String>) -> Self {
        self.failures.insert(identifier.into());
        self
    }

    /// Panics on every invocation of the model.
    pub fn with_panic(mut self, identifier: impl Into<String>) -> Self {
        self.panics.insert(identifier.into());
        self
    }

    /// Delays every invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delays invocations of one model, overriding the global delay.
    pub fn with_delay_for(mut self, identifier: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(identifier.into(), delay);
        self
    }

    /// Returns the completed invocations in completion order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the completed invocations of one model.
    pub fn invocations_of(&self, identifier: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|call| call.identifier == identifier)
            .collect()
    }
}

#[async_trait::async_trait]
impl InferenceInvoker for MockInvoker {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        input: &str,
    ) -> Result<String, InvocationError> {
        let identifier = model.identifier();
        let started = Instant::now();

        let delay = self.delays.get(identifier).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.panics.contains(identifier) {
            panic!("mock invoker panic for {identifier}");
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Invocation {
                identifier: identifier.to_owned(),
                input: input.to_owned(),
                started,
                finished: Instant::now(),
            });

        if self.failures.contains(identifier) {
            return Err(InvocationError::backend(format!("mock failure for {identifier}")));
        }

        Ok(self
            .responses
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| format!("{identifier}: {input}")))
    }
}

/// In-memory content store keyed by input node and data step.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    entries: Arc<RwLock<HashMap<(NodeId, DataStep), StepContent>>>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records content captured by an input node at a data step.
    pub fn insert(&self, node: NodeId, step: DataStep, content: StepContent) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((node, step), content);
    }
}

impl ContentStore for MemoryContentStore {
    fn content(&self, node: &Node, step: DataStep) -> Option<StepContent> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(node.id, step))
            .cloned()
    }
}

/// Reporter recording every progress event.
///
/// Clones share the recorded events.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
