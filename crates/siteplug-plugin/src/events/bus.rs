//! Event bus with named, one-shot and wildcard listeners.
//!
//! Dispatch is synchronous. `emit` takes a snapshot of the listeners under
//! the lock and invokes them after releasing it, so a handler may freely
//! subscribe or unsubscribe:
//!
//! - A listener added during dispatch first fires on the next `emit`.
//! - A listener removed during dispatch still runs in the current `emit`.
//!
//! A listener returning `Err` is logged and skipped; the remaining listeners
//! still run.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use siteplug_core::result::AppResult;
use siteplug_core::types::id::SubscriptionId;

/// Listener for a named event; receives the event payload.
pub type Listener = Arc<dyn Fn(&Value) -> AppResult<Value> + Send + Sync>;

/// Listener for every event; receives the full event record.
pub type AnyListener = Arc<dyn Fn(&EmittedEvent) -> AppResult<Value> + Send + Sync>;

/// Source label used by [`EventBus::emit`].
const DEFAULT_SOURCE: &str = "system";

/// An event recorded in the bus history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// Event name.
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Who emitted it (plugin name or subsystem).
    pub source: String,
}

#[derive(Clone)]
struct ListenerEntry {
    id: SubscriptionId,
    callback: Listener,
}

#[derive(Clone)]
struct AnyListenerEntry {
    id: SubscriptionId,
    callback: AnyListener,
}

#[derive(Default)]
struct Listeners {
    persistent: HashMap<String, Vec<ListenerEntry>>,
    once: HashMap<String, Vec<ListenerEntry>>,
    any: Vec<AnyListenerEntry>,
}

/// Serializable bus status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusStatus {
    /// Event names with at least one persistent or one-shot listener.
    pub registered_events: Vec<String>,
    /// Persistent + one-shot + wildcard listeners.
    pub total_listeners: usize,
    /// Wildcard listeners.
    pub any_listeners: usize,
    /// Events currently held in history.
    pub history_len: usize,
    /// History capacity.
    pub max_history: usize,
    /// Events emitted since construction.
    pub emitted_total: u64,
    /// Listener invocations that returned an error.
    pub listener_errors: u64,
}

/// Process-wide publish/subscribe registry keyed by event name.
pub struct EventBus {
    listeners: RwLock<Listeners>,
    history: Mutex<VecDeque<EmittedEvent>>,
    max_history: AtomicUsize,
    emitted_total: AtomicU64,
    listener_errors: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("max_history", &self.max_history.load(Ordering::Relaxed))
            .field("emitted_total", &self.emitted_total.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventBus {
    /// Creates a bus retaining at most `max_history` events.
    pub fn new(max_history: usize) -> Self {
        Self {
            listeners: RwLock::new(Listeners::default()),
            history: Mutex::new(VecDeque::with_capacity(max_history.min(1024))),
            max_history: AtomicUsize::new(max_history),
            emitted_total: AtomicU64::new(0),
            listener_errors: AtomicU64::new(0),
        }
    }

    /// Registers a persistent listener for `event`.
    pub fn subscribe<F>(&self, event: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.listeners
            .write()
            .persistent
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                callback: Arc::new(callback),
            });
        debug!(event = %event, subscription = %id, "Listener subscribed");
        id
    }

    /// Registers a listener that is removed after its first invocation.
    pub fn subscribe_once<F>(&self, event: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.listeners
            .write()
            .once
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                callback: Arc::new(callback),
            });
        debug!(event = %event, subscription = %id, "One-shot listener subscribed");
        id
    }

    /// Registers a listener that fires for every emitted event.
    pub fn subscribe_any<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EmittedEvent) -> AppResult<Value> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.listeners.write().any.push(AnyListenerEntry {
            id,
            callback: Arc::new(callback),
        });
        debug!(subscription = %id, "Wildcard listener subscribed");
        id
    }

    /// Removes a subscription from the persistent, one-shot, and wildcard
    /// lists. Returns `false` if nothing matched.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut guard = self.listeners.write();
        let listeners = &mut *guard;
        let mut removed = false;

        for map in [&mut listeners.persistent, &mut listeners.once] {
            if let Some(entries) = map.get_mut(event) {
                let before = entries.len();
                entries.retain(|e| e.id != id);
                removed |= entries.len() != before;
                if entries.is_empty() {
                    map.remove(event);
                }
            }
        }

        let before = listeners.any.len();
        listeners.any.retain(|e| e.id != id);
        removed |= listeners.any.len() != before;

        removed
    }

    /// Emits `event` with the default `system` source.
    pub fn emit(&self, event: &str, data: Value) -> Vec<Value> {
        self.emit_from(DEFAULT_SOURCE, event, data)
    }

    /// Emits `event`, invoking wildcard, persistent, then one-shot listeners,
    /// and returns every successful listener's return value in invocation
    /// order.
    pub fn emit_from(&self, source: &str, event: &str, data: Value) -> Vec<Value> {
        let record = EmittedEvent {
            event_type: event.to_string(),
            data,
            timestamp: Utc::now(),
            source: source.to_string(),
        };

        let (any, persistent, once) = {
            let mut listeners = self.listeners.write();
            let any = listeners.any.clone();
            let persistent = listeners.persistent.get(event).cloned().unwrap_or_default();
            let once = listeners.once.remove(event).unwrap_or_default();
            (any, persistent, once)
        };

        let mut results = Vec::with_capacity(any.len() + persistent.len() + once.len());

        for entry in &any {
            match (entry.callback)(&record) {
                Ok(value) => results.push(value),
                Err(e) => self.listener_failed(event, entry.id, &e.to_string()),
            }
        }

        for entry in persistent.iter().chain(once.iter()) {
            match (entry.callback)(&record.data) {
                Ok(value) => results.push(value),
                Err(e) => self.listener_failed(event, entry.id, &e.to_string()),
            }
        }

        self.emitted_total.fetch_add(1, Ordering::Relaxed);
        self.push_history(record);

        results
    }

    fn listener_failed(&self, event: &str, id: SubscriptionId, error: &str) {
        self.listener_errors.fetch_add(1, Ordering::Relaxed);
        warn!(event = %event, subscription = %id, error = %error, "Event listener failed");
    }

    fn push_history(&self, record: EmittedEvent) {
        let max = self.max_history.load(Ordering::Relaxed);
        let mut history = self.history.lock();
        history.push_back(record);
        while history.len() > max {
            history.pop_front();
        }
    }

    /// Returns a copy of the history, oldest first.
    pub fn history(&self) -> Vec<EmittedEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// Returns the history entries for a single event name, oldest first.
    pub fn history_for(&self, event: &str) -> Vec<EmittedEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.event_type == event)
            .cloned()
            .collect()
    }

    /// Drops all history entries.
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Changes the history capacity, evicting the oldest entries if needed.
    pub fn set_max_history(&self, max: usize) {
        self.max_history.store(max, Ordering::Relaxed);
        self.trim_history(max);
    }

    /// Keeps only the newest `keep` entries. Returns how many were dropped.
    pub fn trim_history(&self, keep: usize) -> usize {
        let mut history = self.history.lock();
        let excess = history.len().saturating_sub(keep);
        history.drain(..excess);
        excess
    }

    /// Drops entries emitted before `cutoff`. Returns how many were dropped.
    pub fn prune_history_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut history = self.history.lock();
        let before = history.len();
        history.retain(|e| e.timestamp >= cutoff);
        before - history.len()
    }

    /// Persistent plus pending one-shot listeners for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        let listeners = self.listeners.read();
        listeners.persistent.get(event).map_or(0, Vec::len)
            + listeners.once.get(event).map_or(0, Vec::len)
    }

    /// Every listener on the bus, including wildcard listeners.
    pub fn total_listener_count(&self) -> usize {
        let listeners = self.listeners.read();
        listeners.persistent.values().map(Vec::len).sum::<usize>()
            + listeners.once.values().map(Vec::len).sum::<usize>()
            + listeners.any.len()
    }

    /// Event names with at least one listener, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let listeners = self.listeners.read();
        let mut names: Vec<String> = listeners
            .persistent
            .keys()
            .chain(listeners.once.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Returns a status snapshot.
    pub fn status(&self) -> BusStatus {
        let any_listeners = self.listeners.read().any.len();
        BusStatus {
            registered_events: self.event_names(),
            total_listeners: self.total_listener_count(),
            any_listeners,
            history_len: self.history.lock().len(),
            max_history: self.max_history.load(Ordering::Relaxed),
            emitted_total: self.emitted_total.load(Ordering::Relaxed),
            listener_errors: self.listener_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
