//! # siteplug-plugin
//!
//! Plugin engine for Siteplug. Provides:
//!
//! - Event bus with persistent, one-shot, and wildcard listeners
//! - Hook registry with priority-ordered filters and actions
//! - Plugin registry with a dependency graph and cycle detection
//! - Lifecycle manager that activates dependencies first and serializes
//!   load/unload over the shared graph
//! - Background maintenance (history cleanup, memory sampling)

pub mod api;
pub mod events;
pub mod hooks;
pub mod maintenance;
pub mod manager;
pub mod metrics;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use api::context::PluginContext;
pub use events::bus::{EmittedEvent, EventBus};
pub use hooks::registry::HookRegistry;
pub use manager::{PluginManager, SystemStatus};
pub use registry::{DependencyReport, PluginRegistry};
pub use traits::{LoadGuard, Plugin, PluginMetadata};
