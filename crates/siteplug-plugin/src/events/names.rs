//! Event names emitted by the lifecycle manager.

/// A plugin finished loading (payload: `name`, `duration_ms`).
pub const PLUGIN_LOADED: &str = "plugin:loaded";
/// A plugin failed to load (payload: `name`, `error`, `duration_ms`).
pub const PLUGIN_LOAD_FAILED: &str = "plugin:load:failed";
/// A plugin entered the activation order (payload: `name`).
pub const PLUGIN_ACTIVATED: &str = "plugin:activated";
/// A plugin left the activation order (payload: `name`).
pub const PLUGIN_DEACTIVATED: &str = "plugin:deactivated";
/// A plugin was deactivated and unregistered (payload: `name`, `duration_ms`).
pub const PLUGIN_UNLOADED: &str = "plugin:unloaded";
/// A plugin failed to unload (payload: `name`, `error`, `duration_ms`).
pub const PLUGIN_UNLOAD_FAILED: &str = "plugin:unload:failed";

/// The manager finished one-time initialization.
pub const SYSTEM_INITIALIZED: &str = "system:initialized";
/// A maintenance pass ran (payload: counts of trimmed entries).
pub const SYSTEM_CLEANUP: &str = "system:cleanup";
/// A memory sample was taken (payload: `resident_bytes`).
pub const SYSTEM_MEMORY_SAMPLE: &str = "system:memory";
/// The manager finished shutting down.
pub const SYSTEM_SHUTDOWN: &str = "system:shutdown";

/// Source label used for events the manager emits itself.
pub const MANAGER_SOURCE: &str = "plugin-manager";
