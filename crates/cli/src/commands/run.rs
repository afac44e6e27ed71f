//! Full pipeline command

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tracing::info;

use super::DiagnosticRow;
use crate::config::AppConfig;
use crate::io;
use crate::output::{
    format_fraction_pct, format_opt, print_info, print_json, print_rows, print_success,
    print_warning, OutputFormat,
};
use capacity_core::pipeline::RunSummary;
use capacity_core::Pipeline;

/// Row for the summary table
#[derive(Tabled)]
struct TableCountRow {
    #[tabled(rename = "Table")]
    table: &'static str,
    #[tabled(rename = "Rows")]
    rows: usize,
}

/// Row for the forecast quality table
#[derive(Tabled)]
struct QualityRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "MAPE")]
    mape: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "Matched")]
    matched: usize,
}

#[derive(Serialize)]
struct RunReport<'a> {
    summary: RunSummary,
    output_dir: &'a Path,
    files: Vec<PathBuf>,
}

/// Run the pipeline over the input file and write every table to `output_dir`
pub async fn run_pipeline(
    config: &AppConfig,
    input: &Path,
    output_dir: &Path,
    metrics_out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let registry = config.registry()?;
    let pipeline_config = config.pipeline_config()?;
    let records = io::read_records(input)?;

    let pipeline = Pipeline::new(registry, pipeline_config).context("Failed to build pipeline")?;
    let output = pipeline.run(&records).await;

    let files = io::write_output(output_dir, &output)?;
    info!(dir = %output_dir.display(), files = files.len(), "Output tables written");

    if let Some(path) = metrics_out {
        let text = pipeline
            .metrics()
            .gather_text()
            .context("Failed to encode metrics")?;
        io::write_metrics(path, &text)?;
    }

    let summary = output.summary();
    match format {
        OutputFormat::Json => {
            print_json(&RunReport {
                summary,
                output_dir,
                files,
            })?;
        }
        OutputFormat::Table => {
            print_rows(vec![
                TableCountRow { table: "enriched", rows: summary.enriched },
                TableCountRow { table: "forecasts", rows: summary.forecasts },
                TableCountRow { table: "quality", rows: summary.quality },
                TableCountRow { table: "anomalies", rows: summary.anomalies },
                TableCountRow { table: "alerts", rows: summary.alerts },
                TableCountRow { table: "diagnostics", rows: summary.diagnostics },
            ]);

            if !output.quality.is_empty() {
                let rows: Vec<QualityRow> = output
                    .quality
                    .iter()
                    .map(|q| QualityRow {
                        site: q.site_id.clone(),
                        metric: q.metric_name.to_string(),
                        mape: format_fraction_pct(q.mape),
                        rmse: format_opt(q.rmse, 3),
                        matched: q.matched_periods,
                    })
                    .collect();
                print_rows(rows);
            }

            if summary.degraded_quality > 0 {
                print_info(&format!(
                    "{} quality score(s) degraded (series too short or misaligned)",
                    summary.degraded_quality
                ));
            }
            if summary.alerts > 0 {
                print_warning(&format!("{} capacity alert(s) raised", summary.alerts));
            }
            if !output.diagnostics.is_empty() {
                print_warning(&format!(
                    "{} record(s) rejected, {} unit(s) skipped",
                    summary.rejected,
                    summary.diagnostics - summary.rejected
                ));
                print_rows(output.diagnostics.iter().map(DiagnosticRow::from).collect());
            }

            print_success(&format!("Tables written to {}", output_dir.display()));
        }
    }

    Ok(())
}
