//! Step indices.
//!
//! Runs are requested for a zero-based [`Step`], while captured content and
//! stored results are addressed by the one-based [`DataStep`] that follows it.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Zero-based step index a run is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Step(u64);

impl Step {
    /// Creates a step index.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the data step this step reads and writes.
    pub const fn data_step(self) -> DataStep {
        DataStep(self.0.saturating_add(1))
    }
}

/// One-based step index under which content and results are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct DataStep(u64);

impl DataStep {
    /// Creates a data step index.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<Step> for DataStep {
    fn from(step: Step) -> Self {
        step.data_step()
    }
}
