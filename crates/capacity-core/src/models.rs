//! Core data models for capacity reporting

use crate::calendar::PeriodCadence;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed design constants of one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConstants {
    /// Racks available for sale (design total racks)
    pub sellable_racks: u32,
    /// Planned IT load per rack
    pub contract_density_kw_per_rack: f64,
    pub design_it_capacity_kw: f64,
    pub design_total_load_kw: f64,
    pub design_pue: f64,
    /// Floor area taken by one rack
    pub rack_footprint_m2: f64,
    /// Total data hall floor area
    pub gross_white_space_m2: f64,
    /// Grid carbon intensity
    pub carbon_factor_t_per_kwh: f64,
}

/// One raw utilization row as delivered by the input boundary
///
/// Numeric fields are optional because spreadsheet exports leave blanks;
/// enrichment rejects a row with a missing field instead of defaulting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub site_id: String,
    pub reporting_date: NaiveDate,
    #[serde(default)]
    pub total_contracted_racks: Option<f64>,
    #[serde(default)]
    pub reserved_racks: Option<f64>,
    #[serde(default)]
    pub decommissioned_racks: Option<f64>,
    #[serde(default)]
    pub avg_it_load_kw: Option<f64>,
    #[serde(default)]
    pub avg_total_load_kw: Option<f64>,
}

/// Raw record plus every derived KPI and the constants used to compute them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub site_id: String,
    pub reporting_date: NaiveDate,
    pub cadence: PeriodCadence,

    // Raw measurements
    pub total_contracted_racks: f64,
    pub reserved_racks: f64,
    pub decommissioned_racks: f64,
    pub avg_it_load_kw: f64,
    pub avg_total_load_kw: f64,

    // Occupancy and power ratios
    pub rack_utilization_pct: f64,
    pub remaining_capacity_racks: f64,
    pub it_load_pct: f64,
    pub pue: f64,

    // Design constants
    pub design_total_racks: f64,
    pub design_it_capacity_kw: f64,
    pub design_total_load_kw: f64,
    pub design_pue_target: f64,
    pub rack_density_kw: f64,
    pub rack_footprint_m2: f64,
    pub gross_white_space_m2: f64,
    pub carbon_factor_t_per_kwh: f64,
    pub design_space_racks_m2: f64,

    // Contracted and remaining capacity
    pub contracted_load_kw: f64,
    pub contracted_space_m2: f64,
    pub remaining_load_kw: f64,
    pub remaining_space_m2: f64,
    pub remaining_racks: f64,

    // Facility power
    pub facility_power_kw: f64,
    pub cooling_load_kw: f64,
    pub demand_ratio: f64,
    pub actual_density_kw_per_rack: f64,

    // Energy and carbon
    pub hours_in_period: f64,
    pub energy_kwh: f64,
    pub carbon_emissions_t: f64,

    // Comparisons against design
    pub rack_utilization_vs_design_pct: f64,
    pub it_load_vs_design_pct: f64,
    pub total_load_vs_design_pct: f64,
    pub pue_vs_target: f64,
    pub fill_ratio_pct: f64,
    /// Remaining space against gross white space
    pub remaining_vs_design_pct: f64,
    /// Remaining space against the rack footprint design space
    pub remaining_vs_design_racks_pct: f64,
}

/// Enriched column that can be projected into a forecastable series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiMetric {
    TotalContractedRacks,
    AvgItLoadKw,
    AvgTotalLoadKw,
    RemainingCapacityRacks,
    RackUtilizationPct,
    ItLoadPct,
    Pue,
    PueVsTarget,
    RackUtilizationVsDesignPct,
    ItLoadVsDesignPct,
    TotalLoadVsDesignPct,
    FillRatioPct,
    RemainingLoadKw,
    EnergyKwh,
    CarbonEmissionsT,
}

impl KpiMetric {
    pub const ALL: [KpiMetric; 15] = [
        KpiMetric::TotalContractedRacks,
        KpiMetric::AvgItLoadKw,
        KpiMetric::AvgTotalLoadKw,
        KpiMetric::RemainingCapacityRacks,
        KpiMetric::RackUtilizationPct,
        KpiMetric::ItLoadPct,
        KpiMetric::Pue,
        KpiMetric::PueVsTarget,
        KpiMetric::RackUtilizationVsDesignPct,
        KpiMetric::ItLoadVsDesignPct,
        KpiMetric::TotalLoadVsDesignPct,
        KpiMetric::FillRatioPct,
        KpiMetric::RemainingLoadKw,
        KpiMetric::EnergyKwh,
        KpiMetric::CarbonEmissionsT,
    ];

    /// Metrics forecast when none are configured
    pub fn default_set() -> Vec<KpiMetric> {
        vec![
            KpiMetric::TotalContractedRacks,
            KpiMetric::AvgItLoadKw,
            KpiMetric::AvgTotalLoadKw,
            KpiMetric::RemainingCapacityRacks,
            KpiMetric::PueVsTarget,
            KpiMetric::RackUtilizationVsDesignPct,
        ]
    }

    /// Read this metric's column from an enriched record
    pub fn value(&self, record: &EnrichedRecord) -> f64 {
        match self {
            KpiMetric::TotalContractedRacks => record.total_contracted_racks,
            KpiMetric::AvgItLoadKw => record.avg_it_load_kw,
            KpiMetric::AvgTotalLoadKw => record.avg_total_load_kw,
            KpiMetric::RemainingCapacityRacks => record.remaining_capacity_racks,
            KpiMetric::RackUtilizationPct => record.rack_utilization_pct,
            KpiMetric::ItLoadPct => record.it_load_pct,
            KpiMetric::Pue => record.pue,
            KpiMetric::PueVsTarget => record.pue_vs_target,
            KpiMetric::RackUtilizationVsDesignPct => record.rack_utilization_vs_design_pct,
            KpiMetric::ItLoadVsDesignPct => record.it_load_vs_design_pct,
            KpiMetric::TotalLoadVsDesignPct => record.total_load_vs_design_pct,
            KpiMetric::FillRatioPct => record.fill_ratio_pct,
            KpiMetric::RemainingLoadKw => record.remaining_load_kw,
            KpiMetric::EnergyKwh => record.energy_kwh,
            KpiMetric::CarbonEmissionsT => record.carbon_emissions_t,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KpiMetric::TotalContractedRacks => "total_contracted_racks",
            KpiMetric::AvgItLoadKw => "avg_it_load_kw",
            KpiMetric::AvgTotalLoadKw => "avg_total_load_kw",
            KpiMetric::RemainingCapacityRacks => "remaining_capacity_racks",
            KpiMetric::RackUtilizationPct => "rack_utilization_pct",
            KpiMetric::ItLoadPct => "it_load_pct",
            KpiMetric::Pue => "pue",
            KpiMetric::PueVsTarget => "pue_vs_target",
            KpiMetric::RackUtilizationVsDesignPct => "rack_utilization_vs_design_pct",
            KpiMetric::ItLoadVsDesignPct => "it_load_vs_design_pct",
            KpiMetric::TotalLoadVsDesignPct => "total_load_vs_design_pct",
            KpiMetric::FillRatioPct => "fill_ratio_pct",
            KpiMetric::RemainingLoadKw => "remaining_load_kw",
            KpiMetric::EnergyKwh => "energy_kwh",
            KpiMetric::CarbonEmissionsT => "carbon_emissions_t",
        }
    }
}

impl std::fmt::Display for KpiMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KpiMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KpiMetric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// Forecast length in periods with its display label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Horizon {
    pub periods: u32,
    pub label: String,
}

impl Horizon {
    pub fn new(periods: u32, label: impl Into<String>) -> Self {
        Self {
            periods,
            label: label.into(),
        }
    }

    /// Short (6m), medium (12m) and long (24m) horizons
    pub fn default_set() -> Vec<Horizon> {
        vec![
            Horizon::new(6, "6m"),
            Horizon::new(12, "12m"),
            Horizon::new(24, "24m"),
        ]
    }
}

/// One (timestamp, value) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDate,
    pub value: f64,
}

/// Whether a forecast point lies inside or beyond the fitted history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    InSample,
    Forecast,
}

/// One predicted period with its interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub metric_name: KpiMetric,
    pub site_id: String,
    /// Set by the orchestrator; engines leave it empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_label: Option<String>,
    pub kind: PointKind,
}

impl ForecastPoint {
    /// `lower_bound <= point_estimate <= upper_bound`
    pub fn is_well_ordered(&self) -> bool {
        self.lower_bound <= self.point_estimate && self.point_estimate <= self.upper_bound
    }
}

/// Backtest accuracy of one (site, metric) pair
///
/// Both scores are `None` when the history was too short to backtest or the
/// held-out periods could not be aligned with the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub metric_name: KpiMetric,
    pub site_id: String,
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
    /// Held-out periods that matched a forecast timestamp
    pub matched_periods: usize,
}

impl QualityScore {
    pub fn degraded(site_id: impl Into<String>, metric_name: KpiMetric) -> Self {
        Self {
            metric_name,
            site_id: site_id.into(),
            mape: None,
            rmse: None,
            matched_periods: 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mape.is_none() && self.rmse.is_none()
    }
}

/// Actual value that fell outside its in-sample interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: NaiveDate,
    pub metric_name: KpiMetric,
    pub site_id: String,
    pub actual: f64,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl AnomalyRecord {
    /// Signed distance from the nearest bound (positive above, negative below)
    pub fn excess(&self) -> f64 {
        if self.actual > self.upper_bound {
            self.actual - self.upper_bound
        } else if self.actual < self.lower_bound {
            self.actual - self.lower_bound
        } else {
            0.0
        }
    }
}

/// Capacity threshold that an enriched record exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Contracted racks against design racks
    SpaceFill,
    /// Contracted load against design IT capacity
    PowerFill,
    /// Measured IT load against design IT capacity
    DesignUtilization,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::SpaceFill => "space_fill",
            AlertKind::PowerFill => "power_fill",
            AlertKind::DesignUtilization => "design_utilization",
        }
    }
}

/// Capacity alert raised for one enriched record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityAlert {
    pub site_id: String,
    pub reporting_date: NaiveDate,
    pub kind: AlertKind,
    /// Observed fill fraction (0.0-1.0+)
    pub value: f64,
    pub threshold: f64,
}
