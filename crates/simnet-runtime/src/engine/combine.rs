//! Merging of ensemble inputs.

use crate::content::{ContentType, MediaKind, StepContent};
use crate::graph::CombinationMethod;

/// Separator placed between concatenated values.
pub const SEPARATOR: &str = "\n\n";

/// Returns the header a combination method puts in front of `count` values.
pub fn header(method: CombinationMethod, count: usize) -> Option<String> {
    let label = match method {
        CombinationMethod::Concatenate => return None,
        CombinationMethod::AverageLabel => "Average",
        CombinationMethod::VoteLabel => "Vote",
        CombinationMethod::WeightLabel => "Weighted",
    };

    Some(format!("[Ensemble {label} of {count} inputs]:"))
}

/// Merges present input values into the single string a model is invoked with.
///
/// A single value passes through with its content type. With several values,
/// a leading media file is returned as-is (media is never concatenated);
/// otherwise the values are joined with a blank line, behind the method's
/// header if it has one. Returns `None` for no values.
pub fn combine(inputs: &[StepContent], method: CombinationMethod) -> Option<StepContent> {
    let (first, rest) = inputs.split_first()?;

    if rest.is_empty() {
        return Some(first.clone());
    }

    if let Some(kind) = MediaKind::sniff(&first.value) {
        return Some(StepContent::new(kind.into(), first.value.clone()));
    }

    let joined = inputs
        .iter()
        .map(|input| input.value.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR);

    let value = match header(method, inputs.len()) {
        Some(header) => format!("{header}\n{joined}"),
        None => joined,
    };

    Some(StepContent::new(ContentType::Text, value))
}
