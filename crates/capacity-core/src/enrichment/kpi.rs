//! KPI derivation from raw utilization rows
//!
//! Derivation runs in a fixed order because later fields depend on earlier
//! ones: occupancy, power ratios, design joins, design denominators,
//! contracted/remaining capacity, facility power, energy and carbon, and
//! finally the comparisons against design.

use crate::calendar::PeriodCadence;
use crate::error::{CapacityError, Result};
use crate::models::{EnrichedRecord, RawRecord, SiteConstants};
use crate::registry::SiteRegistry;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Enrich a monthly record against its site constants
pub fn enrich(record: &RawRecord, constants: &SiteConstants) -> Result<EnrichedRecord> {
    enrich_with_cadence(record, constants, PeriodCadence::Monthly)
}

/// Enrich a record whose period length follows `cadence`
pub fn enrich_with_cadence(
    record: &RawRecord,
    constants: &SiteConstants,
    cadence: PeriodCadence,
) -> Result<EnrichedRecord> {
    let guard = FieldGuard {
        site_id: &record.site_id,
        reporting_date: record.reporting_date,
    };

    let total_contracted_racks =
        guard.require("total_contracted_racks", record.total_contracted_racks)?;
    let reserved_racks = guard.require("reserved_racks", record.reserved_racks)?;
    let decommissioned_racks =
        guard.require("decommissioned_racks", record.decommissioned_racks)?;
    let avg_it_load_kw = guard.require("avg_it_load_kw", record.avg_it_load_kw)?;
    let avg_total_load_kw = guard.require("avg_total_load_kw", record.avg_total_load_kw)?;

    let occupied_racks = reserved_racks + decommissioned_racks;
    if occupied_racks > total_contracted_racks {
        return Err(guard.fail(
            "reserved_racks",
            format!(
                "reserved + decommissioned racks ({}) exceed total contracted racks ({})",
                occupied_racks, total_contracted_racks
            ),
        ));
    }
    if avg_total_load_kw < avg_it_load_kw {
        return Err(guard.fail(
            "avg_total_load_kw",
            format!(
                "total load {} kW is below IT load {} kW (negative cooling load)",
                avg_total_load_kw, avg_it_load_kw
            ),
        ));
    }

    // 1. Occupancy
    let rack_utilization_pct =
        guard.ratio("total_contracted_racks", occupied_racks, total_contracted_racks)? * 100.0;
    let remaining_capacity_racks = total_contracted_racks - occupied_racks;

    // 2. Power ratios, always from measured loads
    let it_load_pct = guard.ratio("avg_total_load_kw", avg_it_load_kw, avg_total_load_kw)? * 100.0;
    let pue = guard.ratio("avg_it_load_kw", avg_total_load_kw, avg_it_load_kw)?;

    // 3. Design joins
    let design_total_racks = f64::from(constants.sellable_racks);
    let design_it_capacity_kw = constants.design_it_capacity_kw;
    let design_total_load_kw = constants.design_total_load_kw;
    let design_pue_target = constants.design_pue;
    let rack_density_kw = constants.contract_density_kw_per_rack;
    let rack_footprint_m2 = constants.rack_footprint_m2;
    let gross_white_space_m2 = constants.gross_white_space_m2;
    let carbon_factor_t_per_kwh = constants.carbon_factor_t_per_kwh;

    // 4. Design denominators
    let design_space_racks_m2 = design_total_racks * rack_footprint_m2;

    // 5. Contracted and remaining
    let contracted_load_kw = total_contracted_racks * rack_density_kw;
    let contracted_space_m2 = total_contracted_racks * rack_footprint_m2;
    let remaining_load_kw = design_it_capacity_kw - contracted_load_kw;
    let remaining_space_m2 = design_space_racks_m2 - contracted_space_m2;
    let remaining_racks = design_total_racks - total_contracted_racks;

    let facility_power_kw = avg_total_load_kw;
    let cooling_load_kw = facility_power_kw - avg_it_load_kw;
    let demand_ratio = guard.ratio("contracted_load_kw", avg_total_load_kw, contracted_load_kw)?;
    let actual_density_kw_per_rack =
        guard.ratio("total_contracted_racks", avg_it_load_kw, total_contracted_racks)?;

    // 6. Energy and carbon over the real period length
    let hours_in_period = cadence.hours_in_period(record.reporting_date);
    let energy_kwh = facility_power_kw * hours_in_period;
    let carbon_emissions_t = energy_kwh * carbon_factor_t_per_kwh;

    // 7. Comparisons against design
    let rack_utilization_vs_design_pct =
        guard.ratio("design_total_racks", total_contracted_racks, design_total_racks)? * 100.0;
    let it_load_vs_design_pct =
        guard.ratio("design_it_capacity_kw", avg_it_load_kw, design_it_capacity_kw)? * 100.0;
    let total_load_vs_design_pct =
        guard.ratio("design_total_load_kw", avg_total_load_kw, design_total_load_kw)? * 100.0;
    let pue_vs_target = guard.ratio("design_pue_target", pue, design_pue_target)?;
    let fill_ratio_pct =
        guard.ratio("design_it_capacity_kw", contracted_load_kw, design_it_capacity_kw)? * 100.0;
    let remaining_vs_design_pct =
        guard.ratio("gross_white_space_m2", remaining_space_m2, gross_white_space_m2)? * 100.0;
    let remaining_vs_design_racks_pct =
        guard.ratio("design_space_racks_m2", remaining_space_m2, design_space_racks_m2)? * 100.0;

    Ok(EnrichedRecord {
        site_id: record.site_id.clone(),
        reporting_date: record.reporting_date,
        cadence,
        total_contracted_racks,
        reserved_racks,
        decommissioned_racks,
        avg_it_load_kw,
        avg_total_load_kw,
        rack_utilization_pct,
        remaining_capacity_racks,
        it_load_pct,
        pue,
        design_total_racks,
        design_it_capacity_kw,
        design_total_load_kw,
        design_pue_target,
        rack_density_kw,
        rack_footprint_m2,
        gross_white_space_m2,
        carbon_factor_t_per_kwh,
        design_space_racks_m2,
        contracted_load_kw,
        contracted_space_m2,
        remaining_load_kw,
        remaining_space_m2,
        remaining_racks,
        facility_power_kw,
        cooling_load_kw,
        demand_ratio,
        actual_density_kw_per_rack,
        hours_in_period,
        energy_kwh,
        carbon_emissions_t,
        rack_utilization_vs_design_pct,
        it_load_vs_design_pct,
        total_load_vs_design_pct,
        pue_vs_target,
        fill_ratio_pct,
        remaining_vs_design_pct,
        remaining_vs_design_racks_pct,
    })
}

/// Field checks that attach site and date to every rejection
struct FieldGuard<'a> {
    site_id: &'a str,
    reporting_date: NaiveDate,
}

impl FieldGuard<'_> {
    fn fail(&self, field: &'static str, reason: impl Into<String>) -> CapacityError {
        CapacityError::data_quality(self.site_id, self.reporting_date, field, reason)
    }

    /// Present, finite and non-negative raw value
    fn require(&self, field: &'static str, value: Option<f64>) -> Result<f64> {
        match value {
            None => Err(self.fail(field, "missing")),
            Some(v) if !v.is_finite() => Err(self.fail(field, format!("not a finite number ({})", v))),
            Some(v) if v < 0.0 => Err(self.fail(field, format!("negative value {}", v))),
            Some(v) => Ok(v),
        }
    }

    /// Guarded division; `field` names the denominator
    fn ratio(&self, field: &'static str, numerator: f64, denominator: f64) -> Result<f64> {
        if denominator == 0.0 {
            return Err(self.fail(field, "zero denominator"));
        }
        if denominator < 0.0 {
            return Err(self.fail(field, format!("negative denominator {}", denominator)));
        }
        let value = numerator / denominator;
        if !value.is_finite() {
            return Err(self.fail(field, "ratio is not finite"));
        }
        Ok(value)
    }
}

/// Row rejected during enrichment
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub record: RawRecord,
    pub error: CapacityError,
}

/// Enriches rows against the site registry
#[derive(Debug, Clone)]
pub struct KpiEnricher {
    registry: Arc<SiteRegistry>,
    cadence: PeriodCadence,
}

impl KpiEnricher {
    pub fn new(registry: Arc<SiteRegistry>, cadence: PeriodCadence) -> Self {
        Self { registry, cadence }
    }

    pub fn cadence(&self) -> PeriodCadence {
        self.cadence
    }

    /// Enrich one row, looking up its site's constants
    pub fn enrich(&self, record: &RawRecord) -> Result<EnrichedRecord> {
        let constants = self.registry.get(&record.site_id)?;
        enrich_with_cadence(record, constants, self.cadence)
    }

    /// Enrich every row; rejected rows are returned alongside, never dropped silently
    pub fn enrich_all(&self, records: &[RawRecord]) -> (Vec<EnrichedRecord>, Vec<RejectedRecord>) {
        let mut enriched = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for record in records {
            match self.enrich(record) {
                Ok(e) => enriched.push(e),
                Err(error) => {
                    warn!(
                        site_id = %record.site_id,
                        reporting_date = %record.reporting_date,
                        kind = %error.kind(),
                        error = %error,
                        "Record rejected during enrichment"
                    );
                    rejected.push(RejectedRecord {
                        record: record.clone(),
                        error,
                    });
                }
            }
        }

        debug!(
            enriched = enriched.len(),
            rejected = rejected.len(),
            cadence = %self.cadence,
            "Enrichment finished"
        );
        (enriched, rejected)
    }
}
