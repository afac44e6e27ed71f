//! JSON input and output adapters

use anyhow::{Context, Result};
use capacity_core::{PipelineOutput, RawRecord};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output table file names
pub const ENRICHED_FILE: &str = "enriched_monthly.json";
pub const FORECAST_FILE: &str = "forecast.json";
pub const QUALITY_FILE: &str = "forecast_quality.json";
pub const ANOMALIES_FILE: &str = "forecast_anomalies.json";
pub const ALERTS_FILE: &str = "capacity_alerts.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";

/// Read a JSON array of raw records
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse records in {}", path.display()))?;
    debug!(path = %path.display(), records = records.len(), "Input loaded");
    Ok(records)
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<PathBuf> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(rows)
        .with_context(|| format!("Failed to serialize {}", name))?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), rows = rows.len(), "Table written");
    Ok(path)
}

/// Write every output table into `dir`, creating it if needed
pub fn write_output(dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    Ok(vec![
        write_table(dir, ENRICHED_FILE, &output.enriched)?,
        write_table(dir, FORECAST_FILE, &output.forecasts)?,
        write_table(dir, QUALITY_FILE, &output.quality)?,
        write_table(dir, ANOMALIES_FILE, &output.anomalies)?,
        write_table(dir, ALERTS_FILE, &output.alerts)?,
        write_table(dir, DIAGNOSTICS_FILE, &output.diagnostics)?,
    ])
}

/// Write the Prometheus text exposition to `path`
pub fn write_metrics(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write metrics to {}", path.display()))
}
