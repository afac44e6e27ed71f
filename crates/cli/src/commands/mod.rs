//! CLI command implementations

pub mod enrich;
pub mod run;
pub mod sites;

use capacity_core::Diagnostic;
use tabled::Tabled;

use crate::output::color_kind;

/// Row for diagnostics tables
#[derive(Tabled)]
pub struct DiagnosticRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Horizon")]
    horizon: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&Diagnostic> for DiagnosticRow {
    fn from(d: &Diagnostic) -> Self {
        Self {
            stage: d.stage.as_str().to_string(),
            site: d.site_id.clone(),
            metric: d.metric_name.map(|m| m.to_string()).unwrap_or_default(),
            horizon: d.horizon_label.clone().unwrap_or_default(),
            date: d.reporting_date.map(|t| t.to_string()).unwrap_or_default(),
            kind: color_kind(d.kind.as_str()),
            message: d.message.clone(),
        }
    }
}
