//! Rolling timing windows, lifecycle counters, and memory samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};

/// Fixed-capacity window of duration samples in milliseconds.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Creates an empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Records a sample, evicting the oldest when full.
    pub fn push(&mut self, elapsed: Duration) {
        self.samples.push_back(elapsed.as_secs_f64() * 1000.0);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Mean of the retained samples, `0.0` when empty.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Keeps only the newest `keep` samples. Returns how many were dropped.
    pub fn trim(&mut self, keep: usize) -> usize {
        let excess = self.samples.len().saturating_sub(keep);
        self.samples.drain(..excess);
        excess
    }
}

/// One memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    /// When the sample was taken.
    pub taken_at: DateTime<Utc>,
    /// Resident set size in bytes.
    pub resident_bytes: u64,
}

/// Load/unload timing and counters for the lifecycle manager.
#[derive(Debug)]
pub struct LifecycleMetrics {
    load_times: Mutex<RollingWindow>,
    unload_times: Mutex<RollingWindow>,
    memory: Mutex<VecDeque<MemorySample>>,
    /// Successful loads.
    pub loads_total: AtomicU64,
    /// Failed loads.
    pub load_failures: AtomicU64,
    /// Successful unloads.
    pub unloads_total: AtomicU64,
    /// Failed unloads.
    pub unload_failures: AtomicU64,
}

impl LifecycleMetrics {
    /// Creates zeroed metrics with the given window size.
    pub fn new(window: usize) -> Self {
        Self {
            load_times: Mutex::new(RollingWindow::new(window)),
            unload_times: Mutex::new(RollingWindow::new(window)),
            memory: Mutex::new(VecDeque::new()),
            loads_total: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            unloads_total: AtomicU64::new(0),
            unload_failures: AtomicU64::new(0),
        }
    }

    /// Records a load attempt.
    pub fn record_load(&self, elapsed: Duration, ok: bool) {
        if ok {
            self.loads_total.fetch_add(1, Ordering::Relaxed);
            self.load_times.lock().push(elapsed);
        } else {
            self.load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an unload attempt.
    pub fn record_unload(&self, elapsed: Duration, ok: bool) {
        if ok {
            self.unloads_total.fetch_add(1, Ordering::Relaxed);
            self.unload_times.lock().push(elapsed);
        } else {
            self.unload_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Appends a memory sample, keeping at most `max_samples`.
    pub fn record_memory(&self, sample: MemorySample, max_samples: usize) {
        let mut memory = self.memory.lock();
        memory.push_back(sample);
        while memory.len() > max_samples {
            memory.pop_front();
        }
    }

    /// All retained memory samples, oldest first.
    pub fn memory_samples(&self) -> Vec<MemorySample> {
        self.memory.lock().iter().copied().collect()
    }

    /// Trims every rolling window to `keep` entries. Returns the number of
    /// dropped entries.
    pub fn trim(&self, keep: usize, keep_memory: usize) -> usize {
        let mut dropped = self.load_times.lock().trim(keep);
        dropped += self.unload_times.lock().trim(keep);
        let mut memory = self.memory.lock();
        let excess = memory.len().saturating_sub(keep_memory);
        memory.drain(..excess);
        dropped + excess
    }

    /// Returns a snapshot of the lifecycle counters and averages.
    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            average_load_ms: self.load_times.lock().average_ms(),
            average_unload_ms: self.unload_times.lock().average_ms(),
            loads_total: self.loads_total.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            unloads_total: self.unloads_total.load(Ordering::Relaxed),
            unload_failures: self.unload_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for LifecycleMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Serializable lifecycle metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    /// Rolling average plugin load time.
    pub average_load_ms: f64,
    /// Rolling average plugin unload time.
    pub average_unload_ms: f64,
    /// Successful loads since start.
    pub loads_total: u64,
    /// Failed loads since start.
    pub load_failures: u64,
    /// Successful unloads since start.
    pub unloads_total: u64,
    /// Failed unloads since start.
    pub unload_failures: u64,
}

/// Resident memory of the current process, if the platform exposes it.
pub fn resident_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|process| process.memory())
}
