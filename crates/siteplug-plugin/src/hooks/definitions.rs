//! Hook callback types and entry descriptors.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use siteplug_core::result::AppResult;
use siteplug_core::types::id::HookId;

/// Default priority for hook registrations (lower = runs first).
pub const DEFAULT_PRIORITY: i32 = 10;

/// Raw hook callback. Receives the invocation arguments; for filters the
/// first argument is the value being folded.
pub type HookCallback = Arc<dyn Fn(&[Value]) -> AppResult<Value> + Send + Sync>;

/// How a callback was registered. Both kinds share one ordered list per
/// hook name; the kind only changes how the callback's return is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Transforms the value passed through `apply_filters`.
    Filter,
    /// Runs for side effects; passes the value through unchanged.
    Action,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => write!(f, "filter"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// Public description of a registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    /// Handle for `remove_hook`.
    pub id: HookId,
    /// Hook name the callback is attached to.
    pub hook: String,
    /// Execution priority.
    pub priority: i32,
    /// Owner (plugin name) used for bulk removal.
    pub owner: String,
    /// Registration kind.
    pub kind: HookKind,
}

/// Wraps a filter closure `(value, extra_args) -> value` into a raw callback.
pub fn filter_callback<F>(f: F) -> HookCallback
where
    F: Fn(Value, &[Value]) -> AppResult<Value> + Send + Sync + 'static,
{
    Arc::new(move |args: &[Value]| match args.split_first() {
        Some((value, rest)) => f(value.clone(), rest),
        None => f(Value::Null, &[]),
    })
}

/// Wraps an action closure into a raw callback that passes the first
/// argument through unchanged.
pub fn action_callback<F>(f: F) -> HookCallback
where
    F: Fn(&[Value]) -> AppResult<()> + Send + Sync + 'static,
{
    Arc::new(move |args: &[Value]| {
        f(args)?;
        Ok(args.first().cloned().unwrap_or(Value::Null))
    })
}
