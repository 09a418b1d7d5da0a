//! `siteplug` administration CLI.

mod commands;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Quiet by default; `RUST_LOG=debug` shows engine logs on stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = commands::Cli::parse();
    if let Err(e) = cli.execute().await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}
