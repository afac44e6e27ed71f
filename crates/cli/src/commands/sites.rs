//! Site registry listing

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::config::AppConfig;
use crate::output::{print_info, print_json, print_rows, OutputFormat};
use capacity_core::SiteConstants;

/// Row for the sites table
#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Site")]
    id: String,
    #[tabled(rename = "Racks")]
    racks: u32,
    #[tabled(rename = "kW/Rack")]
    density: String,
    #[tabled(rename = "Design IT kW")]
    design_it: String,
    #[tabled(rename = "Design Total kW")]
    design_total: String,
    #[tabled(rename = "Design PUE")]
    design_pue: String,
    #[tabled(rename = "White Space m²")]
    white_space: String,
}

#[derive(Serialize)]
struct SiteJson<'a> {
    site_id: &'a str,
    #[serde(flatten)]
    constants: &'a SiteConstants,
}

/// Print the validated site registry
pub fn show_sites(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let registry = config.registry()?;

    match format {
        OutputFormat::Json => {
            let sites: Vec<SiteJson> = registry
                .iter()
                .map(|(site_id, constants)| SiteJson { site_id, constants })
                .collect();
            print_json(&sites)?;
        }
        OutputFormat::Table => {
            let rows: Vec<SiteRow> = registry
                .iter()
                .map(|(id, c)| SiteRow {
                    id: id.to_string(),
                    racks: c.sellable_racks,
                    density: format!("{:.1}", c.contract_density_kw_per_rack),
                    design_it: format!("{:.0}", c.design_it_capacity_kw),
                    design_total: format!("{:.0}", c.design_total_load_kw),
                    design_pue: format!("{:.2}", c.design_pue),
                    white_space: format!("{:.0}", c.gross_white_space_m2),
                })
                .collect();
            print_rows(rows);
            print_info(&format!(
                "{} site(s) from {}",
                registry.len(),
                config.source.display()
            ));
        }
    }

    Ok(())
}
