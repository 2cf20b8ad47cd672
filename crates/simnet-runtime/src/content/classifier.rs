//! Content type classification of raw model output.

use super::{ContentType, MediaKind};
use crate::provider::ModelDescriptor;

/// Identifier fragments of image-captioning models; any one pattern (all of
/// its fragments present) forces a text result.
const CAPTIONING_PATTERNS: &[&[&str]] = &[
    &["blip", "captioning"],
    &["image-to-text"],
    &["vit-gpt2"],
    &["clip-interrogator"],
];

/// Classifies the raw output of a model invocation.
///
/// Pure string heuristic: captioning models always produce text, otherwise a
/// path-like output ending in a known media extension is reported as that
/// media type, and everything else is text. Target files are never inspected.
pub fn classify(model: &ModelDescriptor, raw_output: &str) -> ContentType {
    if is_captioning_model(model.identifier()) {
        return ContentType::Text;
    }

    MediaKind::sniff_path(raw_output)
        .map(ContentType::from)
        .unwrap_or(ContentType::Text)
}

fn is_captioning_model(identifier: &str) -> bool {
    let identifier = identifier.to_ascii_lowercase();
    CAPTIONING_PATTERNS
        .iter()
        .any(|fragments| fragments.iter().all(|f| identifier.contains(f)))
}
