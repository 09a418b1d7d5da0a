//! Error type shared by every Siteplug crate.
//!
//! Registry and lifecycle failures carry an [`ErrorKind`] so callers can
//! tell a dependency-graph rejection from a plugin that failed on its own.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// What went wrong, independent of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Unknown plugin, record, or file.
    NotFound,
    /// Bad input: empty plugin name, malformed settings.
    Validation,
    /// Duplicate registration, or an operation the current state forbids.
    Conflict,
    /// Cycle, missing dependency, or dependents still registered/active.
    Dependency,
    /// A plugin's own `load`/`unload` failed.
    Plugin,
    Configuration,
    Serialization,
    Io,
    Internal,
}

impl ErrorKind {
    /// Stable upper-case label used in messages and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::Dependency => "DEPENDENCY",
            Self::Plugin => "PLUGIN",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::Io => "IO",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized error with an optional underlying cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $fn_name:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $fn_name(message: impl Into<String>) -> Self {
                Self::new(ErrorKind::$kind, message)
            }
        )*
    };
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Error of `kind` that keeps `source` as its cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    kind_constructors! {
        not_found => NotFound,
        validation => Validation,
        conflict => Conflict,
        /// Dependency-graph rejection.
        dependency => Dependency,
        plugin => Plugin,
        configuration => Configuration,
        internal => Internal,
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Clones kind and message; the cause is not cloneable and is dropped.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self::new(self.kind, self.message.clone())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("Invalid JSON: {err}");
        Self::with_source(ErrorKind::Serialization, message, err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Io,
        };
        let message = format!("I/O error: {err}");
        Self::with_source(kind, message, err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        let message = format!("Cannot load configuration: {err}");
        Self::with_source(ErrorKind::Configuration, message, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::dependency("Circular dependency detected involving 'a'");
        assert_eq!(
            err.to_string(),
            "DEPENDENCY: Circular dependency detected involving 'a'"
        );
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err = AppError::from(io);
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert!(cloned.is(ErrorKind::Io));
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(AppError::from(io).is(ErrorKind::NotFound));
    }

    #[test]
    fn test_kind_serializes_as_label() {
        let json = serde_json::to_string(&ErrorKind::NotFound).expect("serialize");
        assert_eq!(json, format!("\"{}\"", ErrorKind::NotFound.as_str()));
    }
}
