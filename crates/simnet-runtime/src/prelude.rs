//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use simnet_runtime::prelude::*;
//! ```

pub use crate::content::{ContentType, StepContent};
pub use crate::engine::{
    DataStep, Engine, EngineConfig, NodeOutcome, ProgressEvent, ProgressReporter, RunOptions,
    RunSummary, SkipReason, Step,
};
pub use crate::error::{InvocationError, InvocationErrorKind, RuntimeError, RuntimeResult};
pub use crate::graph::{
    Classification, CombinationMethod, Connection, ModelNode, Node, NodeId, NodeKind,
};
pub use crate::provider::{
    ContentStore, DirectorySink, FileSink, InferenceInvoker, ModelDescriptor, ModelResolver,
    Providers,
};
