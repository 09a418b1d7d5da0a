//! Persisted plugin on/off state.
//!
//! The admin layer stores an array of these records; the host and CLI read
//! them and hand the resolved settings to the plugin factory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One persisted plugin record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    /// Plugin name (matches the plugin's declared metadata name).
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// Whether the plugin should be loaded.
    #[serde(default)]
    pub is_active: bool,
    /// Plugin-specific settings object.
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
}

impl PluginRecord {
    /// Creates an active record with empty settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: default_version(),
            is_active: true,
            settings: empty_settings(),
        }
    }

    /// Replaces the settings object.
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Reads a JSON array of records from disk.
    ///
    /// A missing file is treated as an empty list.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, AppError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Plugin state file missing, using empty list");
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<Self> = serde_json::from_str(&raw)?;
        Ok(records)
    }

    /// Writes records as a pretty-printed JSON array, upserting by name
    /// into whatever the file already holds.
    pub fn upsert(path: impl AsRef<Path>, record: PluginRecord) -> Result<(), AppError> {
        let path = path.as_ref();
        let mut records = Self::load_all(path)?;
        match records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
