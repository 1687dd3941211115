// Job-manager tunables.
//
// All four knobs are configuration values with conservative defaults;
// the daemon overrides them from its TOML config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_MAX_PENDING: usize = 256;
const DEFAULT_RETENTION_SECS: u64 = 900;
const DEFAULT_CANCEL_GRACE_SECS: u64 = 5;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Configuration for the asynchronous job manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobConfig {
    /// Size of the worker pool draining the pending queue.
    pub workers: usize,
    /// Backpressure bound: `schedule` fails once this many jobs wait.
    pub max_pending: usize,
    /// How long terminal snapshots stay queryable before the sweep.
    pub retention_secs: u64,
    /// How long a cancelled handler may keep running before it is
    /// dropped.
    pub cancel_grace_secs: u64,
    /// Cadence of the eviction sweep.
    pub sweep_interval_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_pending: DEFAULT_MAX_PENDING,
            retention_secs: DEFAULT_RETENTION_SECS,
            cancel_grace_secs: DEFAULT_CANCEL_GRACE_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl JobConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// At least one worker runs even under a zero config.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}
