//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use siteplug_core::error::{AppError, ErrorKind};
pub use siteplug_core::result::AppResult;

pub use crate::api::context::PluginContext;
pub use crate::events::bus::{EmittedEvent, EventBus};
pub use crate::events::names;
pub use crate::hooks::definitions::DEFAULT_PRIORITY;
pub use crate::hooks::registry::HookRegistry;
pub use crate::traits::{LoadGuard, Plugin, PluginMetadata};
