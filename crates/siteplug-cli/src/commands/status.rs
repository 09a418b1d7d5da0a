//! Engine status: load every active plugin, report, shut down.

use clap::Args;

use siteplug_core::error::AppError;
use siteplug_plugin::manager::PluginManager;

use super::CliContext;
use crate::output::{self, OutputFormat};

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Also print the rendered document head
    #[arg(long)]
    pub head: bool,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, ctx: &CliContext) -> Result<(), AppError> {
    let manager = PluginManager::new(ctx.config.engine.clone());
    let document = ctx.document();
    let records = ctx.records()?;

    let mut failures = Vec::new();
    for record in records.iter().filter(|r| r.is_active) {
        let plugin = plugin_marketing::build_plugin(record, document.clone(), &ctx.config.site)?;
        if let Err(e) = manager.register_plugin(plugin).await {
            failures.push((record.name.clone(), e.to_string()));
        }
    }
    for record in records.iter().filter(|r| r.is_active) {
        if manager.is_active(&record.name).await || !manager.is_registered(&record.name).await {
            continue;
        }
        if let Err(e) = manager.load_registered(&record.name).await {
            failures.push((record.name.clone(), e.to_string()));
        }
    }

    let status = manager.system_status().await;
    match ctx.format {
        OutputFormat::Json => output::print_json(&status, "{}"),
        OutputFormat::Table => {
            output::print_heading("Siteplug Status:");
            output::print_kv("Config", &ctx.config_path);
            output::print_kv("State File", &ctx.state_file);
            output::print_kv("Registered", &status.registry.total_plugins.to_string());
            output::print_kv("Active", &status.registry.active_plugins.to_string());
            output::print_kv("Activation Order", &status.registry.activation_order.join(" → "));
            output::print_kv("Events Emitted", &status.bus.emitted_total.to_string());
            output::print_kv("Hook Callbacks", &status.hooks.total_callbacks.to_string());
            output::print_kv(
                "Avg Load",
                &format!("{:.2} ms", status.lifecycle.average_load_ms),
            );
            if let Some(memory) = status.memory {
                output::print_kv(
                    "Resident Memory",
                    &format!("{:.1} MiB", memory.resident_bytes as f64 / 1_048_576.0),
                );
            }
            for issue in &status.registry.dependencies.issues {
                output::print_warning(issue);
            }
            for (name, error) in &failures {
                output::print_warning(&format!("{}: {}", name, error));
            }
            if args.head {
                println!();
                print!("{}", document.read().render_head());
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
