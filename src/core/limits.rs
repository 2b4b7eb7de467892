//! Time and concurrency limits for pipeline execution.
//!
//! Prevents hung runs through configurable limits on:
//! - Per-stage provider calls
//! - Whole pipeline runs
//! - Individual variants inside a variant set
//! - Number of variants generated at once

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Per-stage timeout in seconds (default: 300 = 5 min)
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,

    /// Total run timeout in seconds (default: 1800 = 30 min)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,

    /// Timeout for one variant's run inside a variant set (default: 2400 = 40 min)
    #[serde(default = "default_variant_timeout")]
    pub variant_timeout_seconds: u64,

    /// Variants generated concurrently (default: 4)
    #[serde(default = "default_max_concurrent_variants")]
    pub max_concurrent_variants: usize,
}

fn default_stage_timeout() -> u64 {
    300
}
fn default_run_timeout() -> u64 {
    1800
}
fn default_variant_timeout() -> u64 {
    2400
}
fn default_max_concurrent_variants() -> usize {
    4
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            stage_timeout_seconds: default_stage_timeout(),
            run_timeout_seconds: default_run_timeout(),
            variant_timeout_seconds: default_variant_timeout(),
            max_concurrent_variants: default_max_concurrent_variants(),
        }
    }
}

impl RunLimits {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    pub fn variant_timeout(&self) -> Duration {
        Duration::from_secs(self.variant_timeout_seconds)
    }

    /// Concurrency bound, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_variants.max(1)
    }
}
