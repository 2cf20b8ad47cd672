//! External collaborators consumed by the engine.
//!
//! The engine never talks to models, capture devices or the filesystem
//! directly. It goes through these traits:
//! - [`ModelResolver`]: maps a model node to a [`ModelDescriptor`]
//! - [`InferenceInvoker`]: runs a model on a single input string
//! - [`ContentStore`]: captured input content per data step
//! - [`FileSink`]: receives model output routed into file nodes
//!
//! [`Providers`] bundles them for the engine.

mod descriptor;
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;
mod sink;

use std::fmt;
use std::sync::Arc;

pub use descriptor::ModelDescriptor;
pub use sink::{DirectorySink, DirectorySinkConfig, DirectorySinkConfigBuilder};

use crate::content::StepContent;
use crate::engine::DataStep;
use crate::error::{InvocationError, RuntimeResult};
use crate::graph::{ModelNode, Node};

/// Tracing target for provider operations.
pub const TRACING_TARGET: &str = "simnet_runtime::provider";

/// Resolves the model backing a model node.
pub trait ModelResolver: Send + Sync {
    /// Returns the descriptor for the node, or `None` if no model is configured.
    fn resolve(&self, node: &Node, model: &ModelNode) -> Option<ModelDescriptor>;
}

impl<F> ModelResolver for F
where
    F: Fn(&Node, &ModelNode) -> Option<ModelDescriptor> + Send + Sync,
{
    fn resolve(&self, node: &Node, model: &ModelNode) -> Option<ModelDescriptor> {
        self(node, model)
    }
}

/// Runs inference for a resolved model.
#[async_trait::async_trait]
pub trait InferenceInvoker: Send + Sync {
    /// Invokes the model on a single input and returns its raw output.
    async fn invoke(&self, model: &ModelDescriptor, input: &str)
    -> Result<String, InvocationError>;
}

/// Source of captured input content.
pub trait ContentStore: Send + Sync {
    /// Returns the content an input node captured at the given data step.
    fn content(&self, node: &Node, step: DataStep) -> Option<StepContent>;
}

/// Destination for model output routed into file nodes.
#[async_trait::async_trait]
pub trait FileSink: Send + Sync {
    /// Appends `content`, produced by `source`, to the file behind `file`.
    ///
    /// Returns the location written to, which is recorded as the file node's
    /// text output for the step.
    async fn append(
        &self,
        file: &Node,
        source: &Node,
        step: DataStep,
        content: &StepContent,
    ) -> RuntimeResult<String>;
}

/// Collaborators the engine runs against.
#[derive(Clone)]
pub struct Providers {
    resolver: Arc<dyn ModelResolver>,
    invoker: Arc<dyn InferenceInvoker>,
    content: Arc<dyn ContentStore>,
    file_sink: Option<Arc<dyn FileSink>>,
}

impl Providers {
    /// Creates a bundle without a file sink.
    pub fn new(
        resolver: impl ModelResolver + 'static,
        invoker: impl InferenceInvoker + 'static,
        content: impl ContentStore + 'static,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            invoker: Arc::new(invoker),
            content: Arc::new(content),
            file_sink: None,
        }
    }

    /// Creates a bundle from shared collaborators.
    pub fn from_shared(
        resolver: Arc<dyn ModelResolver>,
        invoker: Arc<dyn InferenceInvoker>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            resolver,
            invoker,
            content,
            file_sink: None,
        }
    }

    /// Routes model output connected into file nodes to `sink`.
    pub fn with_file_sink(mut self, sink: impl FileSink + 'static) -> Self {
        self.file_sink = Some(Arc::new(sink));
        self
    }

    /// Returns the model resolver.
    pub fn resolver(&self) -> &dyn ModelResolver {
        self.resolver.as_ref()
    }

    /// Returns the inference invoker.
    pub fn invoker(&self) -> &Arc<dyn InferenceInvoker> {
        &self.invoker
    }

    /// Returns the content store.
    pub fn content(&self) -> &dyn ContentStore {
        self.content.as_ref()
    }

    /// Returns the file sink, if configured.
    pub fn file_sink(&self) -> Option<&Arc<dyn FileSink>> {
        self.file_sink.as_ref()
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("file_sink", &self.file_sink.is_some())
            .finish_non_exhaustive()
    }
}
