//! Per-node execution outcomes.

use derive_more::Display;
use strum::{AsRefStr, IntoStaticStr};

use crate::content::StepContent;
use crate::error::InvocationError;

/// Why a model node did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SkipReason {
    /// The model resolver returned no model for the node.
    #[display("no model configured")]
    UnresolvedModel,
    /// Not enough connected inputs carried content.
    #[display("insufficient inputs: {available} of {required} present")]
    InsufficientInputs {
        /// Inputs the node requires.
        required: usize,
        /// Inputs that were present.
        available: usize,
    },
    /// The run was cancelled before the node's level started.
    #[display("run cancelled")]
    Cancelled,
}

/// Result of executing one model node.
#[derive(Debug)]
pub enum NodeOutcome {
    /// The model produced output, now stored for the step.
    Succeeded(StepContent),
    /// The node was not run.
    Skipped(SkipReason),
    /// The invocation failed; the stored output is unchanged.
    Failed(InvocationError),
}

impl NodeOutcome {
    /// Returns the status of this outcome.
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Succeeded(_) => OutcomeStatus::Succeeded,
            Self::Skipped(_) => OutcomeStatus::Skipped,
            Self::Failed(_) => OutcomeStatus::Failed,
        }
    }

    /// Returns whether the node succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns the produced output, if the node succeeded.
    pub fn output(&self) -> Option<&StepContent> {
        match self {
            Self::Succeeded(content) => Some(content),
            _ => None,
        }
    }

    /// Returns the skip reason, if the node was skipped.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Returns the invocation error, if the node failed.
    pub fn error(&self) -> Option<&InvocationError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Status of a [`NodeOutcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    /// See [`NodeOutcome::Succeeded`].
    Succeeded,
    /// See [`NodeOutcome::Skipped`].
    Skipped,
    /// See [`NodeOutcome::Failed`].
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let success = NodeOutcome::Succeeded(StepContent::text("ok"));
        assert!(success.is_success());
        assert_eq!(success.output().unwrap().value, "ok");

        let skipped = NodeOutcome::Skipped(SkipReason::InsufficientInputs {
            required: 3,
            available: 1,
        });
        assert_eq!(skipped.status(), OutcomeStatus::Skipped);
        assert_eq!(
            skipped.skip_reason().unwrap().to_string(),
            "insufficient inputs: 1 of 3 present"
        );

        let failed = NodeOutcome::Failed(InvocationError::timeout());
        assert_eq!(failed.status().as_ref(), "failed");
        assert!(failed.error().is_some());
    }
}
