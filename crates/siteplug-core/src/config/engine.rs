//! Plugin engine configuration: event history, maintenance, memory sampling.

use serde::{Deserialize, Serialize};

/// Settings for the event bus, hook registry, and lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of emitted events retained in the bus history.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Emitted events older than this many seconds are dropped by the
    /// maintenance pass.
    #[serde(default = "default_history_retention")]
    pub history_retention_seconds: u64,
    /// Interval in seconds between maintenance passes.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Number of timing samples kept per rolling window
    /// (hook execution times, plugin load/unload durations).
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,
    /// Periodic memory-usage sampling.
    #[serde(default)]
    pub memory_sampling: MemorySamplingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            history_retention_seconds: default_history_retention(),
            cleanup_interval_seconds: default_cleanup_interval(),
            metrics_window: default_metrics_window(),
            memory_sampling: MemorySamplingConfig::default(),
        }
    }
}

/// Memory sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySamplingConfig {
    /// Whether the sampler runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Interval in seconds between samples.
    #[serde(default = "default_sample_interval")]
    pub interval_seconds: u64,
    /// Maximum number of samples retained.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for MemorySamplingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_sample_interval(),
            max_samples: default_max_samples(),
        }
    }
}

fn default_history_size() -> usize {
    1000
}

fn default_history_retention() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_metrics_window() -> usize {
    100
}

fn default_sample_interval() -> u64 {
    60
}

fn default_max_samples() -> usize {
    60
}
