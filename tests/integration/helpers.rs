//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use siteplug_core::config::engine::EngineConfig;
use siteplug_plugin::manager::PluginManager;
use siteplug_plugin::prelude::*;

/// Hook every [`CountingPlugin`] registers a filter on while loaded.
pub const COUNTER_HOOK: &str = "test:counter";

/// Event every [`CountingPlugin`] emits from `load`.
pub const COUNTER_LOADED: &str = "test:counter:loaded";

/// Plugin that counts its real (non-redundant) load and unload calls.
#[derive(Debug)]
pub struct CountingPlugin {
    meta: PluginMetadata,
    guard: LoadGuard,
    loads: AtomicUsize,
    unloads: AtomicUsize,
    fail_load: bool,
    fail_unload: bool,
}

impl CountingPlugin {
    pub fn new(name: &str, deps: &[&str]) -> Arc<Self> {
        Self::build(name, deps, false, false)
    }

    /// A plugin whose `load` always fails after registering a hook.
    pub fn failing(name: &str, deps: &[&str]) -> Arc<Self> {
        Self::build(name, deps, true, false)
    }

    /// A plugin that loads normally but whose `unload` always fails.
    pub fn stuck(name: &str, deps: &[&str]) -> Arc<Self> {
        Self::build(name, deps, false, true)
    }

    fn build(name: &str, deps: &[&str], fail_load: bool, fail_unload: bool) -> Arc<Self> {
        Arc::new(Self {
            meta: PluginMetadata::new(name, "1.0.0")
                .with_capabilities(["counter"])
                .depends_on(deps.iter().copied()),
            guard: LoadGuard::new(),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            fail_load,
            fail_unload,
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for CountingPlugin {
    fn metadata(&self) -> PluginMetadata {
        self.meta.clone()
    }

    async fn load(&self, ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }
        let name = self.meta.name.clone();
        ctx.add_filter(COUNTER_HOOK, DEFAULT_PRIORITY, move |value, _| {
            let mut seen = value.as_array().cloned().unwrap_or_default();
            seen.push(json!(name));
            Ok(json!(seen))
        });
        if self.fail_load {
            return Err(AppError::plugin(format!("{} refused to load", self.meta.name)));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        ctx.emit(COUNTER_LOADED, json!({ "name": self.meta.name }));
        self.guard.mark_loaded();
        Ok(())
    }

    async fn unload(&self, _ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }
        if self.fail_unload {
            return Err(AppError::plugin(format!("{} refused to unload", self.meta.name)));
        }
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.guard.mark_unloaded();
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}

/// Fresh manager with default engine settings; background tasks not started.
pub fn manager() -> PluginManager {
    PluginManager::new(EngineConfig::default())
}

/// Context for driving a plugin directly, outside any manager.
pub fn standalone_context(name: &str) -> PluginContext {
    PluginContext::new(
        name,
        Arc::new(EventBus::new(50)),
        Arc::new(HookRegistry::new(20)),
    )
}
