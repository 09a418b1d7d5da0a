//! CLI command definitions and dispatch.

pub mod analyze;
pub mod config;
pub mod plugins;
pub mod sitemap;
pub mod status;

use clap::{Parser, Subcommand};

use plugin_marketing::document::PageDocument;
use siteplug_core::config::AppConfig;
use siteplug_core::error::AppError;
use siteplug_core::types::plugin_record::PluginRecord;

use crate::output::OutputFormat;

/// Siteplug plugin administration for the marketing site
#[derive(Debug, Parser)]
#[command(name = "siteplug", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Plugin state file (overrides `plugins.state_file`)
    #[arg(short, long)]
    pub state: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load the active plugins and report engine status
    Status(status::StatusArgs),
    /// Plugin state management
    Plugins(plugins::PluginsArgs),
    /// Print sitemap.xml
    Sitemap(sitemap::SitemapArgs),
    /// Print robots.txt
    Robots(sitemap::RobotsArgs),
    /// Keyword and readability analysis of a text file
    Analyze(analyze::AnalyzeArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

/// Settings shared by every command after the config file is read.
#[derive(Debug)]
pub struct CliContext {
    pub config: AppConfig,
    pub config_path: String,
    pub state_file: String,
    pub format: OutputFormat,
}

impl CliContext {
    /// Reads the persisted plugin records.
    pub fn records(&self) -> Result<Vec<PluginRecord>, AppError> {
        PluginRecord::load_all(&self.state_file)
    }

    /// Record for `name`, falling back to an active record with defaults.
    pub fn record_or_default(&self, name: &str) -> Result<PluginRecord, AppError> {
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| PluginRecord::new(name)))
    }

    /// Blank document for the site root.
    pub fn document(&self) -> plugin_marketing::SharedDocument {
        PageDocument::new("/").shared()
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        if let Commands::Config(args) = &self.command {
            return config::execute(args, &self.config, self.format).await;
        }

        let config = load_config(&self.config)?;
        let state_file = self
            .state
            .clone()
            .unwrap_or_else(|| config.plugins.state_file.clone());
        tracing::debug!(config = %self.config, state = %state_file, "CLI context ready");
        let ctx = CliContext {
            config,
            config_path: self.config.clone(),
            state_file,
            format: self.format,
        };

        match &self.command {
            Commands::Status(args) => status::execute(args, &ctx).await,
            Commands::Plugins(args) => plugins::execute(args, &ctx).await,
            Commands::Sitemap(args) => sitemap::execute_sitemap(args, &ctx).await,
            Commands::Robots(args) => sitemap::execute_robots(args, &ctx).await,
            Commands::Analyze(args) => analyze::execute(args, &ctx).await,
            Commands::Config(_) => Ok(()),
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::from_file(config_path)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
}

/// Helper: write command output to a file or stdout
pub async fn emit_text(text: &str, output: Option<&str>) -> Result<(), AppError> {
    match output {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, text).await?;
            crate::output::print_success(&format!("Wrote '{}'", path));
        }
        None => print!("{}", text),
    }
    Ok(())
}
