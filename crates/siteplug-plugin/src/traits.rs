//! Plugin contract: declared metadata plus async load/unload.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use siteplug_core::result::AppResult;

use crate::api::context::PluginContext;

/// Declared, immutable description of a plugin.
///
/// Capabilities and dependencies are part of the data contract; nothing is
/// inferred from type names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin name (registry key).
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Capability tags used for lookup by feature.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Names of plugins that must be active first, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginMetadata {
    /// Creates metadata with no capabilities or dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            capabilities: BTreeSet::new(),
            dependencies: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds capability tags.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Adds dependencies, skipping duplicates.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in dependencies {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    /// Whether the plugin declares `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Trait that all plugins must implement.
///
/// `load` and `unload` must be idempotent: calling `load` on a loaded plugin
/// (or `unload` on an unloaded one) returns `Ok(())` without side effects.
/// [`LoadGuard`] provides the flag most implementations need.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Returns the plugin's declared metadata.
    fn metadata(&self) -> PluginMetadata;

    /// Brings the plugin up: register hooks, subscribe to events, inject
    /// page content.
    async fn load(&self, ctx: &PluginContext) -> AppResult<()>;

    /// Tears down everything `load` set up.
    async fn unload(&self, ctx: &PluginContext) -> AppResult<()>;

    /// Whether the plugin's own state says it is loaded.
    fn is_loaded(&self) -> bool;
}

/// Loaded/unloaded flag guarding against redundant `load`/`unload` calls.
#[derive(Debug, Default)]
pub struct LoadGuard {
    loaded: AtomicBool,
}

impl LoadGuard {
    /// Creates a guard in the unloaded state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the guarded plugin is loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Marks the plugin loaded.
    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Marks the plugin unloaded.
    pub fn mark_unloaded(&self) {
        self.loaded.store(false, Ordering::Release);
    }
}
