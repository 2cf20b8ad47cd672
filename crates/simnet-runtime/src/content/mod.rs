//! Content flowing between pipeline nodes.
//!
//! - [`ContentType`]: the closed set of content types
//! - [`StepContent`]: a typed value recorded for a node at one step
//! - [`MediaKind`]: extension-based media detection
//! - [`classify`]: content type of raw model output

mod classifier;
mod content_type;

pub use classifier::classify;
pub use content_type::{AUDIO_EXTENSIONS, ContentType, IMAGE_EXTENSIONS, MediaKind, StepContent};
