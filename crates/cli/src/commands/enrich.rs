//! Enrichment-only command

use anyhow::Result;
use std::path::Path;
use tabled::Tabled;

use super::DiagnosticRow;
use crate::config::AppConfig;
use crate::io;
use crate::output::{color_fill, print_json, print_rows, print_success, print_warning, OutputFormat};
use capacity_core::enrichment::KpiEnricher;
use capacity_core::{Diagnostic, EnrichedRecord};

/// Row for the KPI table
#[derive(Tabled)]
struct KpiRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Racks")]
    racks: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
    #[tabled(rename = "IT kW")]
    it_load: String,
    #[tabled(rename = "PUE")]
    pue: String,
    #[tabled(rename = "Space Fill")]
    space_fill: String,
    #[tabled(rename = "Power Fill")]
    power_fill: String,
    #[tabled(rename = "Energy MWh")]
    energy: String,
}

#[derive(serde::Serialize)]
struct EnrichReport<'a> {
    enriched: &'a [EnrichedRecord],
    rejected: &'a [Diagnostic],
}

/// Enrich the input file and print the KPI table plus rejected rows
pub fn enrich_records(config: &AppConfig, input: &Path, format: OutputFormat) -> Result<()> {
    let registry = config.registry()?;
    let records = io::read_records(input)?;
    let enricher = KpiEnricher::new(registry, config.forecast.cadence);
    let (enriched, rejected) = enricher.enrich_all(&records);

    let rejected: Vec<Diagnostic> = rejected.iter().map(Diagnostic::from).collect();

    match format {
        OutputFormat::Json => {
            print_json(&EnrichReport {
                enriched: &enriched,
                rejected: &rejected,
            })?;
        }
        OutputFormat::Table => {
            if enriched.is_empty() {
                print_warning("No records could be enriched");
            } else {
                let rows: Vec<KpiRow> = enriched
                    .iter()
                    .map(|e| KpiRow {
                        site: e.site_id.clone(),
                        date: e.reporting_date.to_string(),
                        racks: format!("{:.0}", e.total_contracted_racks),
                        utilization: format!("{:.1}%", e.rack_utilization_pct),
                        it_load: format!("{:.1}", e.avg_it_load_kw),
                        pue: format!("{:.2}", e.pue),
                        space_fill: color_fill(e.rack_utilization_vs_design_pct, config.alerts.space_fill),
                        power_fill: color_fill(e.fill_ratio_pct, config.alerts.power_fill),
                        energy: format!("{:.1}", e.energy_kwh / 1000.0),
                    })
                    .collect();
                print_rows(rows);
                print_success(&format!("{} record(s) enriched", enriched.len()));
            }

            if !rejected.is_empty() {
                print_warning(&format!("{} record(s) rejected", rejected.len()));
                print_rows(rejected.iter().map(DiagnosticRow::from).collect());
            }
        }
    }

    Ok(())
}
