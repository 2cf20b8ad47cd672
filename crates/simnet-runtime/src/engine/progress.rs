//! Run progress reporting.

use tokio::sync::mpsc;

use super::{OutcomeStatus, Step};
use crate::graph::NodeId;

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The schedule was computed and execution is starting.
    RunStarted {
        /// Step being executed.
        step: Step,
        /// Model nodes in the snapshot.
        model_count: usize,
        /// Levels in the schedule.
        level_count: usize,
    },
    /// A level is about to launch.
    LevelStarted {
        /// Level index.
        level: usize,
        /// Nodes in the level.
        node_count: usize,
    },
    /// A model node reached a final state.
    NodeFinished {
        /// The node.
        node_id: NodeId,
        /// Level the node belongs to, if it was scheduled.
        level: Option<usize>,
        /// Final state.
        status: OutcomeStatus,
    },
    /// Every node of a level finished.
    LevelCompleted {
        /// Level index.
        level: usize,
        /// Nodes of the level that succeeded.
        succeeded: usize,
    },
    /// The run finished.
    RunCompleted {
        /// Nodes that succeeded.
        success_count: usize,
        /// Nodes that did not succeed.
        skipped_count: usize,
    },
}

/// Receiver of [`ProgressEvent`]s.
///
/// Called from the scheduler and from node tasks, so implementations should
/// return quickly.
pub trait ProgressReporter: Send + Sync {
    /// Handles a progress event. Ignores it by default.
    fn report(&self, event: ProgressEvent) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

/// Reporter forwarding events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    /// Creates a reporter and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Creates a reporter sending into an existing channel.
    pub fn from_sender(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.sender.send(event);
    }
}
