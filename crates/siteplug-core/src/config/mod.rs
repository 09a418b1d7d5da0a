//! Configuration: one struct per TOML section, merged by the `config` crate.

pub mod engine;
pub mod logging;
pub mod site;

use serde::{Deserialize, Serialize};

use self::engine::EngineConfig;
use self::logging::LoggingConfig;
use self::site::SiteConfig;

use crate::error::AppError;

/// Every section; absent sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Event bus, hook registry, and lifecycle manager settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Persisted plugin-state settings.
    #[serde(default)]
    pub plugins: PluginStateConfig,
    /// Public site identity.
    #[serde(default)]
    pub site: SiteConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the persisted plugin on/off state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStateConfig {
    /// JSON file holding an array of plugin records.
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Whether the host loads every active record on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
}

impl Default for PluginStateConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            auto_load: true,
        }
    }
}

/// Prefix for environment overrides: `SITEPLUG__ENGINE__HISTORY_SIZE=50`.
const ENV_PREFIX: &str = "SITEPLUG";

impl AppConfig {
    /// `config/default`, then `config/{env}`, then environment overrides.
    /// Missing files are skipped.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::layered(&["config/default".to_string(), format!("config/{env}")])
    }

    /// One explicit file plus environment overrides. A missing file yields
    /// the defaults.
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        Self::layered(&[path.to_string()])
    }

    fn layered(files: &[String]) -> Result<Self, AppError> {
        let builder = files.iter().fold(config::Config::builder(), |builder, file| {
            builder.add_source(config::File::with_name(file).required(false))
        });
        let merged = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = merged.try_deserialize()?;
        tracing::debug!(files = ?files, "Configuration loaded");
        Ok(config)
    }
}

fn default_state_file() -> String {
    "data/plugins.json".to_string()
}

fn default_true() -> bool {
    true
}
