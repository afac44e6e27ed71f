//! Capacity threshold alerts on enriched records

use crate::models::{AlertKind, CapacityAlert, EnrichedRecord};
use serde::{Deserialize, Serialize};

/// Alert when more than 75% of design racks are contracted
pub const DEFAULT_SPACE_FILL_ALERT: f64 = 0.75;

/// Alert when contracted load exceeds 80% of design IT capacity
pub const DEFAULT_POWER_FILL_ALERT: f64 = 0.80;

/// Alert when measured IT load exceeds 80% of design IT capacity
pub const DEFAULT_DESIGN_UTIL_ALERT: f64 = 0.80;

/// Fill fractions above which an alert is raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_space_fill")]
    pub space_fill: f64,
    #[serde(default = "default_power_fill")]
    pub power_fill: f64,
    #[serde(default = "default_design_utilization")]
    pub design_utilization: f64,
}

fn default_space_fill() -> f64 {
    DEFAULT_SPACE_FILL_ALERT
}

fn default_power_fill() -> f64 {
    DEFAULT_POWER_FILL_ALERT
}

fn default_design_utilization() -> f64 {
    DEFAULT_DESIGN_UTIL_ALERT
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            space_fill: DEFAULT_SPACE_FILL_ALERT,
            power_fill: DEFAULT_POWER_FILL_ALERT,
            design_utilization: DEFAULT_DESIGN_UTIL_ALERT,
        }
    }
}

impl AlertThresholds {
    /// Alerts raised by one record, in a fixed kind order
    pub fn evaluate(&self, record: &EnrichedRecord) -> Vec<CapacityAlert> {
        let checks = [
            (
                AlertKind::SpaceFill,
                record.rack_utilization_vs_design_pct / 100.0,
                self.space_fill,
            ),
            (
                AlertKind::PowerFill,
                record.fill_ratio_pct / 100.0,
                self.power_fill,
            ),
            (
                AlertKind::DesignUtilization,
                record.it_load_vs_design_pct / 100.0,
                self.design_utilization,
            ),
        ];

        checks
            .into_iter()
            .filter(|(_, value, threshold)| value > threshold)
            .map(|(kind, value, threshold)| CapacityAlert {
                site_id: record.site_id.clone(),
                reporting_date: record.reporting_date,
                kind,
                value,
                threshold,
            })
            .collect()
    }
}
