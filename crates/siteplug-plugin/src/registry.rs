//! Plugin registry holding instances, metadata and the dependency graph.
//!
//! The registry is a plain data structure. The lifecycle manager owns it
//! behind an async mutex, which is what serializes activation and
//! deactivation across the shared graph.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;

use crate::traits::{Plugin, PluginMetadata};

/// Outcome of a global dependency health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    /// `true` when `issues` is empty.
    pub valid: bool,
    /// One line per missing dependency or cycle.
    pub issues: Vec<String>,
}

/// Serializable registry status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStatus {
    /// Registered plugin count.
    pub total_plugins: usize,
    /// Active plugin count.
    pub active_plugins: usize,
    /// Active plugin names in activation order.
    pub activation_order: Vec<String>,
    /// Capability tag → plugin names declaring it.
    pub capabilities: BTreeMap<String, Vec<String>>,
    /// Result of [`PluginRegistry::validate_dependencies`].
    pub dependencies: DependencyReport,
}

/// Registry of all registered plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugin name → plugin instance.
    plugins: HashMap<String, Arc<dyn Plugin>>,
    /// Plugin name → metadata.
    metadata: HashMap<String, PluginMetadata>,
    /// Names in registration order, for deterministic listing.
    registration_order: Vec<String>,
    /// Plugin name → dependency names (forward edges).
    dependencies: HashMap<String, Vec<String>>,
    /// Dependency name → registered plugins depending on it (reverse edges).
    dependents: HashMap<String, Vec<String>>,
    /// Active plugins in the order they were brought up.
    activation_order: Vec<String>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin.
    ///
    /// The name is trimmed before use and stored trimmed in the metadata.
    /// Rejects an empty name and duplicate names. Dependencies that are not
    /// registered yet only produce a warning. A registration that would
    /// close a dependency cycle is rejected and leaves the registry
    /// unchanged.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        let mut meta = plugin.metadata();
        let name = meta.name.trim().to_string();
        meta.name = name.clone();

        if name.is_empty() {
            return Err(AppError::validation("Plugin name must be a non-empty string"));
        }
        if self.plugins.contains_key(&name) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is already registered",
                name
            )));
        }

        for dep in &meta.dependencies {
            if !self.plugins.contains_key(dep) && dep != &name {
                warn!(plugin = %name, dependency = %dep, "Dependency not registered yet");
            }
        }

        self.add_edges(&name, &meta.dependencies);

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        if let Err(e) = self.visit(&name, None, &mut visiting, &mut visited, &mut order, false) {
            self.remove_edges(&name);
            warn!(plugin = %name, error = %e, "Registration rejected");
            return Err(e);
        }

        info!(
            plugin = %name,
            version = %meta.version,
            dependencies = meta.dependencies.len(),
            "Plugin registered"
        );

        self.registration_order.push(name.clone());
        self.plugins.insert(name.clone(), plugin);
        self.metadata.insert(name, meta);
        Ok(())
    }

    /// Unregisters a plugin, returning its instance.
    ///
    /// Fails without mutating anything if another registered plugin lists
    /// `name` as a dependency.
    pub fn unregister(&mut self, name: &str) -> AppResult<Arc<dyn Plugin>> {
        if !self.plugins.contains_key(name) {
            return Err(AppError::not_found(format!("Plugin '{}' not found", name)));
        }

        let dependents = self.dependents(name);
        if !dependents.is_empty() {
            return Err(AppError::dependency(format!(
                "Cannot unregister '{}': required by {}",
                name,
                dependents.join(", ")
            )));
        }

        self.remove_edges(name);
        self.dependents.remove(name);
        self.activation_order.retain(|n| n != name);
        self.registration_order.retain(|n| n != name);
        self.metadata.remove(name);
        let plugin = self
            .plugins
            .remove(name)
            .ok_or_else(|| AppError::internal(format!("Plugin '{}' vanished", name)))?;

        info!(plugin = %name, "Plugin unregistered");
        Ok(plugin)
    }

    fn add_edges(&mut self, name: &str, deps: &[String]) {
        self.dependencies.insert(name.to_string(), deps.to_vec());
        for dep in deps {
            let list = self.dependents.entry(dep.clone()).or_default();
            if !list.iter().any(|n| n == name) {
                list.push(name.to_string());
            }
        }
    }

    fn remove_edges(&mut self, name: &str) {
        let Some(deps) = self.dependencies.remove(name) else {
            return;
        };
        for dep in deps {
            if let Some(list) = self.dependents.get_mut(&dep) {
                list.retain(|n| n != name);
                if list.is_empty() {
                    self.dependents.remove(&dep);
                }
            }
        }
    }

    /// Returns `name` and its transitive dependencies, dependencies first.
    ///
    /// Fails if `name` is unknown, a dependency is not registered, or a
    /// cycle is reachable from `name`.
    pub fn resolve_dependencies(&self, name: &str) -> AppResult<Vec<String>> {
        if !self.plugins.contains_key(name) {
            return Err(AppError::not_found(format!("Plugin '{}' not found", name)));
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit(name, None, &mut visiting, &mut visited, &mut order, true)?;
        debug!(plugin = %name, order = ?order, "Dependencies resolved");
        Ok(order)
    }

    /// Depth-first post-order walk over the forward edges.
    ///
    /// With `strict == false`, unregistered dependencies are skipped so only
    /// cycles are reported.
    fn visit(
        &self,
        name: &str,
        required_by: Option<&str>,
        visiting: &mut HashSet<String>,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
        strict: bool,
    ) -> AppResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            return Err(AppError::dependency(format!(
                "Circular dependency detected involving plugin '{}'",
                name
            )));
        }

        let Some(deps) = self.dependencies.get(name) else {
            return match (strict, required_by) {
                (true, Some(parent)) => Err(AppError::dependency(format!(
                    "Plugin '{}' depends on '{}', which is not registered",
                    parent, name
                ))),
                _ => Ok(()),
            };
        };

        visiting.insert(name.to_string());
        for dep in deps {
            self.visit(dep, Some(name), visiting, visited, order, strict)?;
        }
        visiting.remove(name);
        visited.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Checks every registered plugin for missing dependencies and cycles.
    pub fn validate_dependencies(&self) -> DependencyReport {
        let mut issues = Vec::new();

        for name in &self.registration_order {
            for dep in self.dependencies.get(name).into_iter().flatten() {
                if !self.plugins.contains_key(dep) {
                    issues.push(format!(
                        "Plugin '{}' depends on missing plugin '{}'",
                        name, dep
                    ));
                }
            }
        }

        for name in &self.registration_order {
            let mut visiting = HashSet::new();
            let mut visited = HashSet::new();
            let mut order = Vec::new();
            if let Err(e) = self.visit(name, None, &mut visiting, &mut visited, &mut order, false) {
                if !issues.contains(&e.message) {
                    issues.push(e.message);
                }
            }
        }

        DependencyReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Appends `name` to the activation order.
    ///
    /// Every dependency must already be active. A no-op if `name` is
    /// already active.
    pub fn mark_active(&mut self, name: &str) -> AppResult<()> {
        if !self.plugins.contains_key(name) {
            return Err(AppError::not_found(format!("Plugin '{}' not found", name)));
        }
        if self.is_active(name) {
            return Ok(());
        }
        let inactive: Vec<&String> = self
            .dependencies
            .get(name)
            .into_iter()
            .flatten()
            .filter(|dep| !self.is_active(dep))
            .collect();
        if !inactive.is_empty() {
            return Err(AppError::dependency(format!(
                "Cannot activate '{}': dependencies not active: {}",
                name,
                inactive
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        self.activation_order.push(name.to_string());
        Ok(())
    }

    /// Removes `name` from the activation order. Returns whether it was
    /// active.
    pub fn mark_inactive(&mut self, name: &str) -> bool {
        let before = self.activation_order.len();
        self.activation_order.retain(|n| n != name);
        before != self.activation_order.len()
    }

    /// Gets a plugin instance by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Gets a plugin's metadata by name.
    pub fn metadata(&self, name: &str) -> Option<&PluginMetadata> {
        self.metadata.get(name)
    }

    /// Metadata of every plugin declaring `capability`, in registration order.
    pub fn by_capability(&self, capability: &str) -> Vec<PluginMetadata> {
        self.registration_order
            .iter()
            .filter_map(|name| self.metadata.get(name))
            .filter(|meta| meta.has_capability(capability))
            .cloned()
            .collect()
    }

    /// Every plugin instance, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Plugin>> {
        self.registration_order
            .iter()
            .filter_map(|name| self.plugins.get(name).cloned())
            .collect()
    }

    /// Every plugin's metadata, in registration order.
    pub fn all_metadata(&self) -> Vec<PluginMetadata> {
        self.registration_order
            .iter()
            .filter_map(|name| self.metadata.get(name).cloned())
            .collect()
    }

    /// Active plugins in the order they were brought up.
    pub fn activation_order(&self) -> &[String] {
        &self.activation_order
    }

    /// Registered plugins that list `name` as a dependency.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.dependents
            .get(name)
            .map(|list| {
                list.iter()
                    .filter(|n| self.plugins.contains_key(*n))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Active plugins that list `name` as a dependency.
    pub fn active_dependents(&self, name: &str) -> Vec<String> {
        self.dependents(name)
            .into_iter()
            .filter(|n| self.is_active(n))
            .collect()
    }

    /// Declared dependencies of `name`.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.dependencies.get(name).cloned().unwrap_or_default()
    }

    /// Whether `name` is in the activation order.
    pub fn is_active(&self, name: &str) -> bool {
        self.activation_order.iter().any(|n| n == name)
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin count.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// Returns a status snapshot.
    pub fn status(&self) -> RegistryStatus {
        let mut capabilities: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &self.registration_order {
            if let Some(meta) = self.metadata.get(name) {
                for cap in &meta.capabilities {
                    capabilities.entry(cap.clone()).or_default().push(name.clone());
                }
            }
        }
        RegistryStatus {
            total_plugins: self.plugins.len(),
            active_plugins: self.activation_order.len(),
            activation_order: self.activation_order.clone(),
            capabilities,
            dependencies: self.validate_dependencies(),
        }
    }
}
