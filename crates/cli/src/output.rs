//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows as a rounded table
pub fn print_rows<T: tabled::Tabled>(rows: Vec<T>) {
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional float, dash when absent
pub fn format_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "-".to_string(),
    }
}

/// Format a fraction (0.05) as a percentage (5.0%)
pub fn format_fraction_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "-".to_string(),
    }
}

/// Color a percentage by how close it is to its alert threshold
pub fn color_fill(pct: f64, threshold_fraction: f64) -> String {
    let formatted = format!("{:.1}%", pct);
    let fraction = pct / 100.0;
    if fraction > threshold_fraction {
        formatted.red().to_string()
    } else if fraction > threshold_fraction * 0.9 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color an error category
pub fn color_kind(kind: &str) -> String {
    match kind {
        "configuration" | "model" => kind.red().to_string(),
        "data_quality" => kind.yellow().to_string(),
        "insufficient_history" | "alignment" => kind.blue().to_string(),
        _ => kind.to_string(),
    }
}
