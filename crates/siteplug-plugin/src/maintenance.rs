//! Background maintenance: periodic cleanup and memory sampling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use siteplug_core::config::engine::EngineConfig;

use crate::events::bus::EventBus;
use crate::events::names;
use crate::hooks::registry::HookRegistry;
use crate::metrics::{LifecycleMetrics, MemorySample, resident_memory_bytes};

/// What a single cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Events dropped for exceeding the retention age.
    pub expired_events: usize,
    /// Events dropped for exceeding the history size.
    pub trimmed_events: usize,
    /// Hook timing samples dropped.
    pub hook_samples: usize,
    /// Lifecycle timing and memory samples dropped.
    pub lifecycle_samples: usize,
}

impl CleanupReport {
    /// Total entries removed.
    pub fn total(&self) -> usize {
        self.expired_events + self.trimmed_events + self.hook_samples + self.lifecycle_samples
    }
}

/// Runs one cleanup pass over the bus history and the timing windows.
pub fn run_cleanup_pass(
    bus: &EventBus,
    hooks: &HookRegistry,
    metrics: &LifecycleMetrics,
    config: &EngineConfig,
) -> CleanupReport {
    let expired_events = match retention_cutoff(config.history_retention_seconds) {
        Some(cutoff) => bus.prune_history_before(cutoff),
        None => 0,
    };
    let report = CleanupReport {
        expired_events,
        trimmed_events: bus.trim_history(config.history_size),
        hook_samples: hooks.trim_timings(config.metrics_window),
        lifecycle_samples: metrics.trim(config.metrics_window, config.memory_sampling.max_samples),
    };
    debug!(removed = report.total(), "Cleanup pass finished");
    report
}

/// Oldest timestamp kept by a pass. `None` when the window reaches past
/// the earliest representable time, so nothing is old enough to expire.
fn retention_cutoff(retention_seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(retention_seconds).ok()?;
    let window = chrono::Duration::try_seconds(seconds)?;
    Utc::now().checked_sub_signed(window)
}

/// Takes one memory sample and stores it in `metrics`.
///
/// Returns `None` when the platform does not expose resident memory.
pub fn sample_memory(metrics: &LifecycleMetrics, max_samples: usize) -> Option<MemorySample> {
    let sample = MemorySample {
        taken_at: Utc::now(),
        resident_bytes: resident_memory_bytes()?,
    };
    metrics.record_memory(sample, max_samples);
    Some(sample)
}

/// Running background tasks and the signal that stops them.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Spawns the cleanup task and, when enabled, the memory sampler.
    pub fn spawn(
        config: EngineConfig,
        bus: Arc<EventBus>,
        hooks: Arc<HookRegistry>,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(2);

        tasks.push(tokio::spawn(run_cleanup_loop(
            config.clone(),
            bus.clone(),
            hooks,
            metrics.clone(),
            rx.clone(),
        )));

        if config.memory_sampling.enabled {
            tasks.push(tokio::spawn(run_memory_sampler(config, bus, metrics, rx)));
        }

        info!(tasks = tasks.len(), "Maintenance tasks started");
        Self { shutdown, tasks }
    }

    /// Number of spawned tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signals every task to stop and waits for them to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Maintenance tasks stopped");
    }
}

async fn run_cleanup_loop(
    config: EngineConfig,
    bus: Arc<EventBus>,
    hooks: Arc<HookRegistry>,
    metrics: Arc<LifecycleMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(Duration::from_secs(config.cleanup_interval_seconds.max(1)));
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = run_cleanup_pass(&bus, &hooks, &metrics, &config);
                bus.emit_from(
                    names::MANAGER_SOURCE,
                    names::SYSTEM_CLEANUP,
                    json!({
                        "expiredEvents": report.expired_events,
                        "trimmedEvents": report.trimmed_events,
                        "hookSamples": report.hook_samples,
                        "lifecycleSamples": report.lifecycle_samples,
                    }),
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Cleanup loop ended");
}

async fn run_memory_sampler(
    config: EngineConfig,
    bus: Arc<EventBus>,
    metrics: Arc<LifecycleMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let sampling = config.memory_sampling;
    let mut interval = time::interval(Duration::from_secs(sampling.interval_seconds.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(sample) = sample_memory(&metrics, sampling.max_samples) {
                    bus.emit_from(
                        names::MANAGER_SOURCE,
                        names::SYSTEM_MEMORY_SAMPLE,
                        json!({
                            "residentBytes": sample.resident_bytes,
                            "takenAt": sample.taken_at,
                        }),
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Memory sampler ended");
}
