//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use siteplug_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration file
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            match format {
                OutputFormat::Json => output::print_json(&config, "{}"),
                OutputFormat::Table => println!("{:#?}", config),
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                let mut problems = Vec::new();
                if config.engine.history_size == 0 {
                    problems.push("engine.history_size must be greater than 0");
                }
                if config.engine.cleanup_interval_seconds == 0 {
                    problems.push("engine.cleanup_interval_seconds must be greater than 0");
                }
                if !config.site.base_url.starts_with("http://")
                    && !config.site.base_url.starts_with("https://")
                {
                    problems.push("site.base_url must be an http(s) URL");
                }
                if !problems.is_empty() {
                    for problem in &problems {
                        output::print_error(problem);
                    }
                    return Err(AppError::configuration(format!(
                        "Configuration '{}' has {} problem(s)",
                        config_path,
                        problems.len()
                    )));
                }

                output::print_success(&format!("Configuration '{}' is valid", config_path));
                output::print_kv("Site", &format!("{} ({})", config.site.name, config.site.base_url));
                output::print_kv("State File", &config.plugins.state_file);
                output::print_kv("History Size", &config.engine.history_size.to_string());
                output::print_kv(
                    "Memory Sampling",
                    if config.engine.memory_sampling.enabled { "on" } else { "off" },
                );
                output::print_kv("Log Level", &config.logging.level);
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
