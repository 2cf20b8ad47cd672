//! Engine configuration.

use std::num::NonZeroUsize;

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::store::DEFAULT_SHARDS;

/// Configuration for the evaluation engine.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Multiplier applied to the available parallelism to size the per-level
    /// concurrency gate.
    #[cfg_attr(
        feature = "config",
        arg(long = "concurrency-factor", env = "SIMNET_CONCURRENCY_FACTOR", default_value = "2")
    )]
    #[builder(default = "2")]
    #[serde(default = "default_concurrency_factor")]
    pub concurrency_factor: usize,

    /// Fixed size of the per-level concurrency gate, overriding the
    /// parallelism-based size.
    #[cfg_attr(
        feature = "config",
        arg(long = "max-concurrency", env = "SIMNET_MAX_CONCURRENCY")
    )]
    #[builder(default)]
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Whether inputs of nodes fed only by input nodes are resolved before the
    /// first level starts.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "precompute-inputs",
            env = "SIMNET_PRECOMPUTE_INPUTS",
            default_value = "true",
            action = clap::ArgAction::Set
        )
    )]
    #[builder(default = "true")]
    #[serde(default = "default_precompute_inputs")]
    pub precompute_inputs: bool,

    /// Number of lock shards in the result store and the per-run caches.
    /// Must be a power of two greater than 1.
    #[cfg_attr(
        feature = "config",
        arg(long = "store-shards", env = "SIMNET_STORE_SHARDS", default_value = "16")
    )]
    #[builder(default = "DEFAULT_SHARDS")]
    #[serde(default = "default_store_shards")]
    pub store_shards: usize,
}

fn default_concurrency_factor() -> usize {
    2
}

fn default_precompute_inputs() -> bool {
    true
}

fn default_store_shards() -> usize {
    DEFAULT_SHARDS
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(factor) = self.concurrency_factor
            && factor == 0
        {
            return Err("concurrency_factor must be at least 1".into());
        }
        if let Some(Some(max)) = self.max_concurrency
            && max == 0
        {
            return Err("max_concurrency must be at least 1".into());
        }
        if let Some(shards) = self.store_shards
            && (shards < 2 || !shards.is_power_of_two())
        {
            return Err("store_shards must be a power of two greater than 1".into());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_factor: default_concurrency_factor(),
            max_concurrency: None,
            precompute_inputs: default_precompute_inputs(),
            store_shards: default_store_shards(),
        }
    }
}

impl EngineConfig {
    /// Returns the number of permits for a level of `level_size` nodes.
    ///
    /// Without an override this is the larger of `concurrency_factor` times the
    /// available parallelism and the level size, so a level never queues on
    /// the gate unless the override asks for it.
    pub fn permits_for(&self, level_size: usize) -> usize {
        if let Some(max) = self.max_concurrency {
            return max.max(1);
        }

        let parallelism = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        self.concurrency_factor
            .max(1)
            .saturating_mul(parallelism)
            .max(level_size)
            .max(1)
    }
}
