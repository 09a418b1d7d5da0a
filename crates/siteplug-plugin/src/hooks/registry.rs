//! Named, priority-ordered hook callback chains.
//!
//! Entries are kept sorted ascending by priority; equal priorities keep
//! insertion order. A failing callback is logged and skipped, never
//! propagated to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use siteplug_core::result::AppResult;
use siteplug_core::types::id::HookId;

use super::definitions::{
    HookCallback, HookInfo, HookKind, action_callback, filter_callback,
};
use crate::metrics::RollingWindow;

/// Entry in the hook registry.
#[derive(Clone)]
struct HookEntry {
    id: HookId,
    callback: HookCallback,
    priority: i32,
    owner: String,
    kind: HookKind,
}

/// Serializable hook registry status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookStatus {
    /// Hook name → number of callbacks.
    pub hooks: HashMap<String, usize>,
    /// Total callbacks across all hooks.
    pub total_callbacks: usize,
    /// `apply_filters`/`do_action` calls since construction.
    pub invocations: u64,
    /// Callback invocations that returned an error.
    pub failures: u64,
}

/// Registry of hook callbacks organized by hook name.
pub struct HookRegistry {
    /// Hook name → sorted list of entries.
    hooks: RwLock<HashMap<String, Vec<HookEntry>>>,
    /// Hook name → per-call execution times.
    timings: Mutex<HashMap<String, RollingWindow>>,
    window: usize,
    invocations: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hook_names())
            .field("window", &self.window)
            .finish()
    }
}

impl HookRegistry {
    /// Creates an empty registry keeping `window` timing samples per hook.
    pub fn new(window: usize) -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
            timings: Mutex::new(HashMap::new()),
            window,
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Registers a raw callback.
    pub fn add_hook(
        &self,
        hook: &str,
        owner: &str,
        priority: i32,
        kind: HookKind,
        callback: HookCallback,
    ) -> HookId {
        let id = HookId::new();
        let mut hooks = self.hooks.write();
        let entries = hooks.entry(hook.to_string()).or_default();

        // Before the first strictly greater priority: stable for ties.
        let position = entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(entries.len());

        entries.insert(
            position,
            HookEntry {
                id,
                callback,
                priority,
                owner: owner.to_string(),
                kind,
            },
        );

        debug!(
            hook = %hook,
            owner = %owner,
            priority = priority,
            kind = %kind,
            "Hook callback registered"
        );
        id
    }

    /// Registers a filter: `value = f(value, extra_args)`.
    pub fn add_filter<F>(&self, hook: &str, owner: &str, priority: i32, f: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> AppResult<Value> + Send + Sync + 'static,
    {
        self.add_hook(hook, owner, priority, HookKind::Filter, filter_callback(f))
    }

    /// Registers an action run for side effects only.
    pub fn add_action<F>(&self, hook: &str, owner: &str, priority: i32, f: F) -> HookId
    where
        F: Fn(&[Value]) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_hook(hook, owner, priority, HookKind::Action, action_callback(f))
    }

    fn snapshot(&self, hook: &str) -> Vec<HookEntry> {
        self.hooks.read().get(hook).cloned().unwrap_or_default()
    }

    /// Folds `initial` through every callback on `hook` in priority order.
    ///
    /// A failing callback leaves the value as it was before that callback.
    /// With no callbacks the initial value is returned unchanged.
    pub fn apply_filters(&self, hook: &str, initial: Value, extra: &[Value]) -> Value {
        let entries = self.snapshot(hook);
        if entries.is_empty() {
            return initial;
        }

        let started = Instant::now();
        let mut value = initial;

        for entry in &entries {
            let mut args = Vec::with_capacity(extra.len() + 1);
            args.push(value.clone());
            args.extend_from_slice(extra);

            match (entry.callback)(&args) {
                Ok(next) => value = next,
                Err(e) => self.callback_failed(hook, entry, &e.to_string()),
            }
        }

        self.record_call(hook, started);
        value
    }

    /// Invokes every callback on `hook` for side effects.
    pub fn do_action(&self, hook: &str, args: &[Value]) {
        let entries = self.snapshot(hook);
        if entries.is_empty() {
            return;
        }

        let started = Instant::now();
        for entry in &entries {
            if let Err(e) = (entry.callback)(args) {
                self.callback_failed(hook, entry, &e.to_string());
            }
        }
        self.record_call(hook, started);
    }

    fn callback_failed(&self, hook: &str, entry: &HookEntry, error: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            hook = %hook,
            owner = %entry.owner,
            priority = entry.priority,
            error = %error,
            "Hook callback failed, skipping"
        );
    }

    fn record_call(&self, hook: &str, started: Instant) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.timings
            .lock()
            .entry(hook.to_string())
            .or_insert_with(|| RollingWindow::new(self.window))
            .push(started.elapsed());
    }

    /// Removes one callback by handle.
    pub fn remove_hook(&self, hook: &str, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let Some(entries) = hooks.get_mut(hook) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            hooks.remove(hook);
        }
        removed
    }

    /// Removes every callback registered by `owner`, across all hook names.
    /// Returns the number of removed callbacks.
    pub fn remove_owner_hooks(&self, owner: &str) -> usize {
        let mut hooks = self.hooks.write();
        let mut removed = 0;

        for entries in hooks.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.owner != owner);
            removed += before - entries.len();
        }

        hooks.retain(|_, entries| !entries.is_empty());

        if removed > 0 {
            info!(owner = %owner, removed = removed, "Owner hooks removed");
        }
        removed
    }

    /// Whether `hook` has at least one callback.
    pub fn has_hook(&self, hook: &str) -> bool {
        self.hooks
            .read()
            .get(hook)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Descriptors of the callbacks on `hook`, in execution order.
    pub fn hooks(&self, hook: &str) -> Vec<HookInfo> {
        self.hooks
            .read()
            .get(hook)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| HookInfo {
                        id: e.id,
                        hook: hook.to_string(),
                        priority: e.priority,
                        owner: e.owner.clone(),
                        kind: e.kind,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of callbacks registered by `owner`.
    pub fn owner_hook_count(&self, owner: &str) -> usize {
        self.hooks
            .read()
            .values()
            .flatten()
            .filter(|e| e.owner == owner)
            .count()
    }

    /// Every hook name with at least one callback, sorted.
    pub fn hook_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Average execution time of `hook` calls in milliseconds.
    pub fn average_execution_time(&self, hook: &str) -> f64 {
        self.timings
            .lock()
            .get(hook)
            .map(RollingWindow::average_ms)
            .unwrap_or(0.0)
    }

    /// Drops timing windows for hooks that no longer have callbacks and
    /// trims the others to `keep` samples. Returns dropped sample count.
    pub fn trim_timings(&self, keep: usize) -> usize {
        let live: Vec<String> = self.hook_names();
        let mut timings = self.timings.lock();
        let mut dropped = 0;
        timings.retain(|hook, window| {
            if live.iter().any(|h| h == hook) {
                dropped += window.trim(keep);
                true
            } else {
                dropped += window.len();
                false
            }
        });
        dropped
    }

    /// Returns a status snapshot.
    pub fn status(&self) -> HookStatus {
        let hooks = self.hooks.read();
        let counts: HashMap<String, usize> = hooks
            .iter()
            .map(|(name, entries)| (name.clone(), entries.len()))
            .collect();
        HookStatus {
            total_callbacks: counts.values().sum(),
            hooks: counts,
            invocations: self.invocations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new(100)
    }
}
