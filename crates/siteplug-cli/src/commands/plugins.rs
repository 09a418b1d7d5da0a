//! Plugin state CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use siteplug_core::error::AppError;
use siteplug_core::types::plugin_record::PluginRecord;
use siteplug_plugin::registry::PluginRegistry;

use super::CliContext;
use crate::output::{self, OutputFormat};

/// Arguments for plugin commands
#[derive(Debug, Args)]
pub struct PluginsArgs {
    /// Plugin subcommand
    #[command(subcommand)]
    pub command: PluginsCommand,
}

/// Plugin subcommands
#[derive(Debug, Subcommand)]
pub enum PluginsCommand {
    /// List plugins in the state file and the available implementations
    List,
    /// Mark a plugin active in the state file
    Enable {
        /// Plugin name
        name: String,
    },
    /// Mark a plugin inactive in the state file
    Disable {
        /// Plugin name
        name: String,
    },
    /// Check the dependency graph of the active plugins
    Check,
}

/// Plugin display row for table output
#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    /// Plugin name
    name: String,
    /// Version
    version: String,
    /// Whether the state file marks it active
    active: bool,
    /// Capability tags
    capabilities: String,
    /// Declared dependencies
    dependencies: String,
    /// Description
    description: String,
}

/// Execute plugin commands
pub async fn execute(args: &PluginsArgs, ctx: &CliContext) -> Result<(), AppError> {
    match &args.command {
        PluginsCommand::List => list(ctx),
        PluginsCommand::Enable { name } => set_active(ctx, name, true),
        PluginsCommand::Disable { name } => set_active(ctx, name, false),
        PluginsCommand::Check => check(ctx),
    }
}

fn list(ctx: &CliContext) -> Result<(), AppError> {
    let records = ctx.records()?;
    let document = ctx.document();

    let mut names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
    for name in plugin_marketing::PLUGIN_NAMES {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    let rows: Vec<PluginRow> = names
        .iter()
        .map(|name| {
            let record = records.iter().find(|r| &r.name == name);
            let template = record.cloned().unwrap_or_else(|| PluginRecord::new(name.as_str()));
            let meta = plugin_marketing::build_plugin(&template, document.clone(), &ctx.config.site)
                .ok()
                .map(|p| p.metadata());
            PluginRow {
                name: name.clone(),
                version: meta
                    .as_ref()
                    .map(|m| m.version.clone())
                    .unwrap_or_else(|| template.version.clone()),
                active: record.is_some_and(|r| r.is_active),
                capabilities: meta
                    .as_ref()
                    .map(|m| m.capabilities.iter().cloned().collect::<Vec<_>>().join(", "))
                    .unwrap_or_else(|| "-".into()),
                dependencies: meta
                    .as_ref()
                    .map(|m| m.dependencies.join(", "))
                    .unwrap_or_else(|| "-".into()),
                description: meta
                    .map(|m| m.description)
                    .unwrap_or_else(|| template.description.clone()),
            }
        })
        .collect();

    output::print_list(&rows, ctx.format);
    Ok(())
}

fn set_active(ctx: &CliContext, name: &str, active: bool) -> Result<(), AppError> {
    if !plugin_marketing::PLUGIN_NAMES.contains(&name) {
        return Err(AppError::not_found(format!(
            "No plugin implementation named '{}'",
            name
        )));
    }
    let mut record = ctx.record_or_default(name)?;
    record.is_active = active;
    PluginRecord::upsert(&ctx.state_file, record)?;

    let verb = if active { "enabled" } else { "disabled" };
    output::print_success(&format!("Plugin '{}' {}", name, verb));
    Ok(())
}

fn check(ctx: &CliContext) -> Result<(), AppError> {
    let document = ctx.document();
    let mut registry = PluginRegistry::new();
    let mut errors = Vec::new();

    for record in ctx.records()?.iter().filter(|r| r.is_active) {
        let result = plugin_marketing::build_plugin(record, document.clone(), &ctx.config.site)
            .and_then(|plugin| registry.register(plugin));
        if let Err(e) = result {
            errors.push(format!("{}: {}", record.name, e));
        }
    }

    let mut report = registry.validate_dependencies();
    report.issues.extend(errors);
    report.valid = report.issues.is_empty();

    match ctx.format {
        OutputFormat::Json => output::print_json(&report, "{}"),
        OutputFormat::Table => {
            if report.valid {
                output::print_success("Dependency graph is valid");
            }
            for issue in &report.issues {
                output::print_warning(issue);
            }
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(AppError::dependency(format!(
            "{} dependency issue(s) found",
            report.issues.len()
        )))
    }
}
