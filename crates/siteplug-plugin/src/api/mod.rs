//! Plugin API: the context handed to plugin code.

pub mod context;

pub use context::PluginContext;
