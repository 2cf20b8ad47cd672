//! Pipeline evaluation engine.
//!
//! This module provides the runtime for evaluating a pipeline graph at a step:
//! - [`Engine`]: The main entry point, owning the [`ResultStore`]
//! - [`EngineConfig`]: Configuration options
//! - [`DependencyAnalysis`]: Level schedule computed from model connections
//! - [`Scheduler`]: Level-by-level, concurrency-bounded node execution
//! - [`InputResolver`]: Input gathering and ensemble [`combine`]-ing
//! - [`RunContext`]: Per-run caches, cancellation and progress reporting

mod analyzer;
pub mod combine;
mod config;
mod context;
mod executor;
mod outcome;
mod progress;
mod resolver;
mod scheduler;
mod step;
mod store;

pub use analyzer::{BrokenEdge, DependencyAnalysis, Schedule};
pub use combine::combine;
pub use config::{EngineConfig, EngineConfigBuilder, EngineConfigBuilderError};
pub use context::{RunContext, RunOptions};
pub use executor::{Engine, RunSummary};
pub use outcome::{NodeOutcome, OutcomeStatus, SkipReason};
pub use progress::{ChannelReporter, NoopReporter, ProgressEvent, ProgressReporter};
pub use resolver::{InputResolver, ResolvedInput};
pub use scheduler::{ScheduleReport, Scheduler};
pub use step::{DataStep, Step};
pub use store::{DEFAULT_SHARDS, ResultStore};
