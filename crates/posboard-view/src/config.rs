//! Board configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the position board and its reconciliation scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Reconciliation pass interval (ms). Default: 2,000 (2 seconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-journal pull timeout (ms). Bounds how long one slow journal can
    /// hold up a pass. Default: 5,000 (5 seconds).
    #[serde(default = "default_pull_timeout_ms")]
    pub pull_timeout_ms: u64,
    /// Board actor channel capacity. Events arriving while the channel is
    /// full are dropped and reported; the next pass self-heals.
    /// Default: 256.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_pull_timeout_ms() -> u64 {
    5_000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            pull_timeout_ms: default_pull_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}
