#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod content;
pub mod engine;
mod error;
pub mod graph;
pub mod provider;

#[doc(hidden)]
pub mod prelude;

pub use error::{
    BoxedError, InvocationError, InvocationErrorKind, RuntimeError, RuntimeResult,
};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "simnet_runtime";
