//! Runtime error types.

use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by the runtime outside of per-node execution.
///
/// Node-level problems never surface here: they are reported as
/// [`NodeOutcome`](crate::engine::NodeOutcome)s and the run continues.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Engine or sink configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File sink IO failed.
    #[error("file sink error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Categories of inference invocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum InvocationErrorKind {
    /// The model rejected its input.
    InvalidInput,
    /// The inference backend is unreachable or unavailable.
    Unavailable,
    /// The invocation did not finish in time.
    Timeout,
    /// The model produced no output.
    EmptyOutput,
    /// The run was cancelled while the invocation was in flight.
    Cancelled,
    /// The task running the invocation panicked or was aborted.
    Aborted,
    /// The backend reported a failure.
    Backend,
}

impl InvocationErrorKind {
    /// Returns the snake_case name of this kind.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A structured inference invocation error.
#[derive(Debug, Error)]
#[error("{}{}", kind.as_str(), message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct InvocationError {
    /// The kind of error that occurred.
    pub kind: InvocationErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl InvocationError {
    /// Creates a new error with the given kind.
    pub fn new(kind: InvocationErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Backend).with_message(message)
    }

    /// Creates a new timeout error.
    pub fn timeout() -> Self {
        Self::new(InvocationErrorKind::Timeout)
    }

    /// Creates a new unavailable error.
    pub fn unavailable() -> Self {
        Self::new(InvocationErrorKind::Unavailable)
    }

    /// Creates a new empty output error.
    pub fn empty_output() -> Self {
        Self::new(InvocationErrorKind::EmptyOutput)
    }

    /// Creates a new cancellation error.
    pub fn cancelled() -> Self {
        Self::new(InvocationErrorKind::Cancelled)
    }

    /// Creates a new aborted-task error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Aborted).with_message(message)
    }

    /// Returns whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind == InvocationErrorKind::Cancelled
    }
}
