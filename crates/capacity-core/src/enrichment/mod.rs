//! KPI enrichment engine
//!
//! Maps raw utilization rows plus site constants to enriched KPI records,
//! and checks enriched records against capacity alert thresholds.

mod alerts;
mod kpi;

pub use alerts::{
    AlertThresholds, DEFAULT_DESIGN_UTIL_ALERT, DEFAULT_POWER_FILL_ALERT, DEFAULT_SPACE_FILL_ALERT,
};
pub use kpi::{enrich, enrich_with_cadence, KpiEnricher, RejectedRecord};
