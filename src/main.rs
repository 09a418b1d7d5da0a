//! Siteplug host. Loads the configured marketing plugins and keeps them
//! running until shutdown.
//!
//! Main entry point that wires the engine, the plugin implementations, and
//! the persisted plugin state together.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use plugin_marketing::document::PageDocument;
use plugin_marketing::hooks;
use siteplug_core::config::AppConfig;
use siteplug_core::config::logging::LogFormat;
use siteplug_core::error::AppError;
use siteplug_core::types::plugin_record::PluginRecord;
use siteplug_plugin::manager::PluginManager;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Host error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    if let Ok(path) = std::env::var("SITEPLUG_CONFIG") {
        return AppConfig::from_file(&path);
    }
    let env = std::env::var("SITEPLUG_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(config.logging.with_target)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(config.logging.with_target)
                .init();
        }
    }
}

/// Main host run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Siteplug host v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Engine ───────────────────────────────────────────
    let manager = Arc::new(PluginManager::new(config.engine.clone()));
    manager.initialize().await?;

    // ── Step 2: Plugins from the state file ──────────────────────
    let document = PageDocument::new("/").shared();
    if config.plugins.auto_load {
        let records = PluginRecord::load_all(&config.plugins.state_file)?;
        tracing::info!(
            "Loaded {} plugin record(s) from '{}'",
            records.len(),
            config.plugins.state_file
        );
        load_active_plugins(&manager, &records, &document, &config).await;
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    // ── Step 3: Page views refresh the SEO tags ──────────────────
    manager.create_event_hook_bridge(hooks::PAGE_VIEW, hooks::SEO_REFRESH);

    let order = manager.activation_order().await;
    tracing::info!("Active plugins: [{}]", order.join(", "));
    tracing::debug!("Rendered head:\n{}", document.read().render_head());

    // ── Step 4: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, unloading plugins...");
    manager.shutdown().await;

    tracing::info!("Siteplug host stopped");
    Ok(())
}

/// Register every active record first, then load them in file order, so a
/// record may depend on one listed after it.
async fn load_active_plugins(
    manager: &PluginManager,
    records: &[PluginRecord],
    document: &plugin_marketing::SharedDocument,
    config: &AppConfig,
) {
    let mut registered = Vec::new();
    for record in records.iter().filter(|r| r.is_active) {
        let result = plugin_marketing::build_plugin(record, document.clone(), &config.site);
        match result {
            Ok(plugin) => match manager.register_plugin(plugin).await {
                Ok(()) => registered.push(record.name.clone()),
                Err(e) => tracing::error!("Failed to register plugin '{}': {}", record.name, e),
            },
            Err(e) => tracing::error!("Failed to build plugin '{}': {}", record.name, e),
        }
    }

    for name in registered {
        if manager.is_active(&name).await {
            continue;
        }
        if let Err(e) = manager.load_registered(&name).await {
            tracing::error!("Failed to load plugin '{}': {}", name, e);
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
