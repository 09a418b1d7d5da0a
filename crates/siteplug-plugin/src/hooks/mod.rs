//! Hook system: priority-ordered filter and action chains.

pub mod definitions;
pub mod registry;

pub use definitions::{DEFAULT_PRIORITY, HookCallback, HookInfo, HookKind};
pub use registry::{HookRegistry, HookStatus};
