//! The shared bus and hook registry, scoped to one plugin.

use std::sync::Arc;

use serde_json::Value;

use siteplug_core::result::AppResult;
use siteplug_core::types::id::{HookId, SubscriptionId};

use crate::events::bus::EventBus;
use crate::hooks::registry::HookRegistry;

/// Context passed to a plugin's `load`/`unload`.
///
/// Hooks registered through the context are owned by the plugin, so the
/// lifecycle manager can remove them in bulk when it unloads.
#[derive(Clone)]
pub struct PluginContext {
    plugin_name: String,
    bus: Arc<EventBus>,
    hooks: Arc<HookRegistry>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_name", &self.plugin_name)
            .finish()
    }
}

impl PluginContext {
    /// Creates a context for `plugin_name`.
    pub fn new(plugin_name: impl Into<String>, bus: Arc<EventBus>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            bus,
            hooks,
        }
    }

    /// Name of the plugin this context belongs to.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The shared hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Emits an event with this plugin as the source.
    pub fn emit(&self, event: &str, data: Value) -> Vec<Value> {
        self.bus.emit_from(&self.plugin_name, event, data)
    }

    /// Subscribes to an event.
    pub fn subscribe<F>(&self, event: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        self.bus.subscribe(event, callback)
    }

    /// Registers a filter owned by this plugin.
    pub fn add_filter<F>(&self, hook: &str, priority: i32, f: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> AppResult<Value> + Send + Sync + 'static,
    {
        self.hooks.add_filter(hook, &self.plugin_name, priority, f)
    }

    /// Registers an action owned by this plugin.
    pub fn add_action<F>(&self, hook: &str, priority: i32, f: F) -> HookId
    where
        F: Fn(&[Value]) -> AppResult<()> + Send + Sync + 'static,
    {
        self.hooks.add_action(hook, &self.plugin_name, priority, f)
    }

    /// Removes every hook this plugin registered.
    pub fn remove_own_hooks(&self) -> usize {
        self.hooks.remove_owner_hooks(&self.plugin_name)
    }
}
