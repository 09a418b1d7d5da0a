//! Rendering helpers shared by the CLI commands.
//!
//! Data goes to stdout in the selected [`OutputFormat`]; diagnostics
//! (`print_error`) go to stderr so JSON output stays parseable.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Width of the key column in [`print_kv`].
const KEY_WIDTH: usize = 22;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Rows as a table, or as a JSON array.
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(rows, "[]"),
        OutputFormat::Table if rows.is_empty() => println!("(none)"),
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::sharp());
            println!("{table}");
        }
    }
}

/// Pretty JSON; prints `fallback` if the value cannot be serialized.
pub fn print_json<T: Serialize + ?Sized>(value: &T, fallback: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::warn!(error = %e, "Could not serialize output");
            println!("{fallback}");
        }
    }
}

pub fn print_heading(title: &str) {
    println!("{title}");
    println!("{}", "-".repeat(title.chars().count()));
}

pub fn print_success(msg: &str) {
    println!("[ok] {msg}");
}

pub fn print_warning(msg: &str) {
    println!("[warn] {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("[error] {msg}");
}

pub fn print_kv(key: &str, value: &str) {
    let label = format!("{key}:");
    println!("  {label:<KEY_WIDTH$} {value}");
}
