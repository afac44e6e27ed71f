//! Colocation capacity reporting CLI
//!
//! Enriches raw utilization records, forecasts capacity KPIs per site and
//! writes the resulting tables as JSON.

mod commands;
mod config;
mod io;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{enrich, run, sites};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Colocation capacity reporting CLI
#[derive(Parser)]
#[command(name = "dcap")]
#[command(author, version, about = "Data center capacity KPIs, forecasts and anomaly flags", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/dcap/config.toml)
    #[arg(long, short, env = "DCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Log output format (logs go to stderr)
    #[arg(long, default_value = "json")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Human-readable multi-line output
    Pretty,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run enrichment, forecasting, backtests and anomaly detection
    Run {
        /// JSON array of raw records
        #[arg(long, short)]
        input: PathBuf,

        /// Directory for the output tables
        #[arg(long, short)]
        output: PathBuf,

        /// Write Prometheus metrics in text format to this file
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Enrich records only and print the KPI table
    Enrich {
        /// JSON array of raw records
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Show the configured sites and their design constants
    Sites,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let app_config = config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            input,
            output,
            metrics_out,
        } => {
            run::run_pipeline(&app_config, &input, &output, metrics_out.as_deref(), cli.format)
                .await?;
        }
        Commands::Enrich { input } => {
            enrich::enrich_records(&app_config, &input, cli.format)?;
        }
        Commands::Sites => {
            sites::show_sites(&app_config, cli.format)?;
        }
    }

    Ok(())
}
