//! Core type definitions used across the Siteplug workspace.

pub mod id;
pub mod plugin_record;

pub use id::*;
pub use plugin_record::PluginRecord;
