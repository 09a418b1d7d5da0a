//! Lifecycle management for all plugins.
//!
//! Every sequence that mutates the plugin registry runs while holding the
//! registry's async mutex, including the awaited `load`/`unload` calls, so
//! interleaved lifecycle calls over a shared dependency graph are serialized.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use siteplug_core::config::engine::EngineConfig;
use siteplug_core::error::{AppError, ErrorKind};
use siteplug_core::result::AppResult;
use siteplug_core::types::id::SubscriptionId;

use crate::api::context::PluginContext;
use crate::events::bus::{BusStatus, EventBus};
use crate::events::names;
use crate::hooks::registry::{HookRegistry, HookStatus};
use crate::maintenance::MaintenanceHandle;
use crate::metrics::{LifecycleMetrics, LifecycleSnapshot, MemorySample, resident_memory_bytes};
use crate::registry::{DependencyReport, PluginRegistry, RegistryStatus};
use crate::traits::{Plugin, PluginMetadata};

/// Full engine status report.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// Whether `initialize` has run.
    pub initialized: bool,
    /// When the manager was created.
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`.
    pub uptime_seconds: i64,
    /// Event bus status.
    pub bus: BusStatus,
    /// Hook registry status.
    pub hooks: HookStatus,
    /// Plugin registry status.
    pub registry: RegistryStatus,
    /// Current resident memory, when available.
    pub memory: Option<MemorySample>,
    /// Retained memory samples from the sampler.
    pub memory_samples: Vec<MemorySample>,
    /// Load/unload counters and rolling averages.
    pub lifecycle: LifecycleSnapshot,
}

/// Orchestrates plugin registration, activation, and teardown.
#[derive(Debug)]
pub struct PluginManager {
    config: EngineConfig,
    bus: Arc<EventBus>,
    hooks: Arc<HookRegistry>,
    registry: Mutex<PluginRegistry>,
    metrics: Arc<LifecycleMetrics>,
    initialized: AtomicBool,
    started_at: DateTime<Utc>,
    maintenance: parking_lot::Mutex<Option<MaintenanceHandle>>,
}

impl PluginManager {
    /// Creates a manager with a fresh event bus and hook registry.
    pub fn new(config: EngineConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.history_size));
        let hooks = Arc::new(HookRegistry::new(config.metrics_window));
        let metrics = Arc::new(LifecycleMetrics::new(config.metrics_window));

        Self {
            config,
            bus,
            hooks,
            registry: Mutex::new(PluginRegistry::new()),
            metrics,
            initialized: AtomicBool::new(false),
            started_at: Utc::now(),
            maintenance: parking_lot::Mutex::new(None),
        }
    }

    /// Starts the background tasks and emits `system:initialized`.
    ///
    /// Calling it again logs a warning and does nothing.
    pub async fn initialize(&self) -> AppResult<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            warn!("Plugin manager already initialized");
            return Ok(());
        }

        let handle = MaintenanceHandle::spawn(
            self.config.clone(),
            self.bus.clone(),
            self.hooks.clone(),
            self.metrics.clone(),
        );
        *self.maintenance.lock() = Some(handle);

        self.bus.emit_from(
            names::MANAGER_SOURCE,
            names::SYSTEM_INITIALIZED,
            json!({ "memorySampling": self.config.memory_sampling.enabled }),
        );
        info!("Plugin manager initialized");
        Ok(())
    }

    /// Whether `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Registers a plugin without activating it.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        self.registry.lock().await.register(plugin)
    }

    /// Unregisters an inactive plugin.
    ///
    /// Fails if another registered plugin depends on it. An active plugin
    /// with no dependents is refused; use [`unload_plugin`](Self::unload_plugin).
    pub async fn unregister_plugin(&self, name: &str) -> AppResult<()> {
        let mut registry = self.registry.lock().await;
        if registry.is_active(name) && registry.dependents(name).is_empty() {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is active; unload it instead",
                name
            )));
        }
        registry.unregister(name).map(|_| ())
    }

    /// Registers and activates a plugin, dependencies first.
    ///
    /// Emits `plugin:loaded` or `plugin:load:failed`. On failure the error is
    /// returned after the event, and the registration made by this call is
    /// rolled back.
    pub async fn load_plugin(&self, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        let name = plugin.metadata().name.trim().to_string();
        let started = Instant::now();
        let mut registry = self.registry.lock().await;

        let result = match registry.register(plugin) {
            Ok(()) => {
                self.log_dependency_issues(&registry);
                let activated = self.activate(&mut registry, &name).await;
                if activated.is_err() && !registry.is_active(&name) {
                    if let Err(e) = registry.unregister(&name) {
                        warn!(plugin = %name, error = %e, "Rollback of registration failed");
                    }
                }
                activated
            }
            Err(e) => Err(e),
        };
        drop(registry);

        self.finish_load(&name, started, result)
    }

    /// Activates an already registered plugin, dependencies first.
    ///
    /// Emits the same events as [`load_plugin`](Self::load_plugin) but never
    /// unregisters anything.
    pub async fn load_registered(&self, name: &str) -> AppResult<()> {
        let started = Instant::now();
        let mut registry = self.registry.lock().await;

        let result = if registry.is_registered(name) {
            self.log_dependency_issues(&registry);
            self.activate(&mut registry, name).await
        } else {
            Err(AppError::not_found(format!("Plugin '{}' not found", name)))
        };
        drop(registry);

        self.finish_load(name, started, result)
    }

    fn log_dependency_issues(&self, registry: &PluginRegistry) {
        let report = registry.validate_dependencies();
        for issue in &report.issues {
            warn!(issue = %issue, "Dependency validation issue");
        }
    }

    fn finish_load(&self, name: &str, started: Instant, result: AppResult<()>) -> AppResult<()> {
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.metrics.record_load(elapsed, result.is_ok());

        match result {
            Ok(()) => {
                info!(plugin = %name, duration_ms, "Plugin loaded");
                self.bus.emit_from(
                    names::MANAGER_SOURCE,
                    names::PLUGIN_LOADED,
                    json!({ "name": name, "durationMs": duration_ms }),
                );
                Ok(())
            }
            Err(e) => {
                error!(plugin = %name, error = %e, "Plugin load failed");
                self.bus.emit_from(
                    names::MANAGER_SOURCE,
                    names::PLUGIN_LOAD_FAILED,
                    json!({ "name": name, "error": e.to_string(), "durationMs": duration_ms }),
                );
                Err(e)
            }
        }
    }

    /// Loads every not-yet-active plugin in the resolved order.
    async fn activate(&self, registry: &mut PluginRegistry, name: &str) -> AppResult<()> {
        let order = registry.resolve_dependencies(name)?;

        for plugin_name in order {
            if registry.is_active(&plugin_name) {
                continue;
            }
            let plugin = registry
                .get(&plugin_name)
                .ok_or_else(|| AppError::not_found(format!("Plugin '{}' not found", plugin_name)))?;
            let ctx = self.context(&plugin_name);

            if let Err(e) = plugin.load(&ctx).await {
                ctx.remove_own_hooks();
                return Err(AppError::with_source(
                    ErrorKind::Plugin,
                    format!("Plugin '{}' failed to load: {}", plugin_name, e),
                    e,
                ));
            }

            registry.mark_active(&plugin_name)?;
            info!(plugin = %plugin_name, "Plugin activated");
            self.bus.emit_from(
                names::MANAGER_SOURCE,
                names::PLUGIN_ACTIVATED,
                json!({ "name": plugin_name }),
            );
        }

        Ok(())
    }

    /// Deactivates (if active) and unregisters a plugin.
    ///
    /// Fails if the plugin is unknown or another registered plugin depends
    /// on it. Emits `plugin:unloaded` or `plugin:unload:failed`.
    pub async fn unload_plugin(&self, name: &str) -> AppResult<()> {
        let started = Instant::now();
        let mut registry = self.registry.lock().await;

        let result = self.unload_locked(&mut registry, name).await;
        drop(registry);
        self.finish_unload(name, started, result)
    }

    fn finish_unload(&self, name: &str, started: Instant, result: AppResult<()>) -> AppResult<()> {
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.metrics.record_unload(elapsed, result.is_ok());

        match result {
            Ok(()) => {
                info!(plugin = %name, duration_ms, "Plugin unloaded");
                self.bus.emit_from(
                    names::MANAGER_SOURCE,
                    names::PLUGIN_UNLOADED,
                    json!({ "name": name, "durationMs": duration_ms }),
                );
                Ok(())
            }
            Err(e) => {
                error!(plugin = %name, error = %e, "Plugin unload failed");
                self.bus.emit_from(
                    names::MANAGER_SOURCE,
                    names::PLUGIN_UNLOAD_FAILED,
                    json!({ "name": name, "error": e.to_string(), "durationMs": duration_ms }),
                );
                Err(e)
            }
        }
    }

    async fn unload_locked(&self, registry: &mut PluginRegistry, name: &str) -> AppResult<()> {
        if !registry.is_registered(name) {
            return Err(AppError::not_found(format!("Plugin '{}' not found", name)));
        }

        let dependents = registry.dependents(name);
        if !dependents.is_empty() {
            return Err(AppError::dependency(format!(
                "Cannot unload '{}': required by {}",
                name,
                dependents.join(", ")
            )));
        }

        if registry.is_active(name) {
            self.deactivate(registry, name).await?;
        }
        registry.unregister(name)?;
        Ok(())
    }

    async fn deactivate(&self, registry: &mut PluginRegistry, name: &str) -> AppResult<()> {
        let active = registry.active_dependents(name);
        if !active.is_empty() {
            return Err(AppError::dependency(format!(
                "Cannot deactivate '{}': active dependents {}",
                name,
                active.join(", ")
            )));
        }

        let plugin = registry
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("Plugin '{}' not found", name)))?;
        let ctx = self.context(name);

        plugin.unload(&ctx).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Plugin,
                format!("Plugin '{}' failed to unload: {}", name, e),
                e,
            )
        })?;

        registry.mark_inactive(name);
        let removed = ctx.remove_own_hooks();
        info!(plugin = %name, hooks_removed = removed, "Plugin deactivated");
        self.bus.emit_from(
            names::MANAGER_SOURCE,
            names::PLUGIN_DEACTIVATED,
            json!({ "name": name }),
        );
        Ok(())
    }

    /// Forwards every emission of `event` to the `hook` action with the
    /// event payload as the single argument.
    pub fn create_event_hook_bridge(&self, event: &str, hook: &str) -> SubscriptionId {
        let hooks = self.hooks.clone();
        let hook = hook.to_string();
        info!(event = %event, hook = %hook, "Event-hook bridge created");
        self.bus.subscribe(event, move |data| {
            hooks.do_action(&hook, std::slice::from_ref(data));
            Ok(Value::Null)
        })
    }

    /// Builds the full status report.
    pub async fn system_status(&self) -> SystemStatus {
        let registry = self.registry.lock().await.status();
        let memory = resident_memory_bytes().map(|resident_bytes| MemorySample {
            taken_at: Utc::now(),
            resident_bytes,
        });

        SystemStatus {
            initialized: self.is_initialized(),
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            bus: self.bus.status(),
            hooks: self.hooks.status(),
            registry,
            memory,
            memory_samples: self.metrics.memory_samples(),
            lifecycle: self.metrics.snapshot(),
        }
    }

    /// Stops background tasks and unloads every plugin, newest first.
    ///
    /// Active plugins are deactivated in reverse activation order, then every
    /// registration that no longer has a registered dependent is dropped.
    /// Per-plugin failures are logged and skipped.
    pub async fn shutdown(&self) {
        let handle = self.maintenance.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }

        let mut registry = self.registry.lock().await;
        let order: Vec<String> = registry.activation_order().to_vec();
        let mut unloaded = 0;
        for name in order.iter().rev() {
            let started = Instant::now();
            let result = self.deactivate(&mut registry, name).await;
            if self.finish_unload(name, started, result).is_ok() {
                unloaded += 1;
            }
        }

        // Inactive registrations can still pin their dependencies, so
        // unregister in rounds until nothing more can go.
        let mut remaining: Vec<String> = registry
            .all_metadata()
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        loop {
            let before = remaining.len();
            remaining.retain(|name| registry.is_active(name) || registry.unregister(name).is_err());
            if remaining.len() == before {
                break;
            }
        }
        drop(registry);
        if !remaining.is_empty() {
            warn!(plugins = ?remaining, "Plugins left registered after shutdown");
        }

        self.initialized.store(false, Ordering::Release);
        self.bus.emit_from(
            names::MANAGER_SOURCE,
            names::SYSTEM_SHUTDOWN,
            json!({ "unloaded": unloaded }),
        );
        info!("Plugin manager shut down");
    }

    fn context(&self, plugin_name: &str) -> PluginContext {
        PluginContext::new(plugin_name, self.bus.clone(), self.hooks.clone())
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The shared hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active plugins in activation order.
    pub async fn activation_order(&self) -> Vec<String> {
        self.registry.lock().await.activation_order().to_vec()
    }

    /// Whether `name` is active.
    pub async fn is_active(&self, name: &str) -> bool {
        self.registry.lock().await.is_active(name)
    }

    /// Whether `name` is registered.
    pub async fn is_registered(&self, name: &str) -> bool {
        self.registry.lock().await.is_registered(name)
    }

    /// Gets a plugin instance by name.
    pub async fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.lock().await.get(name)
    }

    /// Metadata of plugins declaring `capability`.
    pub async fn plugins_by_capability(&self, capability: &str) -> Vec<PluginMetadata> {
        self.registry.lock().await.by_capability(capability)
    }

    /// Metadata of every registered plugin.
    pub async fn registered_plugins(&self) -> Vec<PluginMetadata> {
        self.registry.lock().await.all_metadata()
    }

    /// Runs the global dependency check.
    pub async fn validate_dependencies(&self) -> DependencyReport {
        self.registry.lock().await.validate_dependencies()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
