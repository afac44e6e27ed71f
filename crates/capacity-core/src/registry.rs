//! Site registry: validated per-site design constants
//!
//! Loaded once per run from configuration and shared read-only with the
//! enrichment engine and the orchestrator.

use crate::error::{CapacityError, Result};
use crate::models::SiteConstants;
use std::collections::BTreeMap;

/// Read-only lookup of design constants keyed by site identifier
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<String, SiteConstants>,
}

impl SiteRegistry {
    /// Build a registry, rejecting any site whose constants break the design invariants
    pub fn new(sites: impl IntoIterator<Item = (String, SiteConstants)>) -> Result<Self> {
        let mut registry = BTreeMap::new();
        for (site_id, constants) in sites {
            validate(&site_id, &constants)?;
            if registry.contains_key(&site_id) {
                return Err(CapacityError::invalid_constant(
                    &site_id,
                    "site_id",
                    "configured more than once",
                ));
            }
            registry.insert(site_id, constants);
        }
        Ok(Self { sites: registry })
    }

    /// Constants for `site_id`, or a configuration error
    pub fn get(&self, site_id: &str) -> Result<&SiteConstants> {
        self.sites
            .get(site_id)
            .ok_or_else(|| CapacityError::UnknownSite {
                site_id: site_id.to_string(),
            })
    }

    pub fn contains(&self, site_id: &str) -> bool {
        self.sites.contains_key(site_id)
    }

    pub fn site_ids(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SiteConstants)> {
        self.sites.iter().map(|(id, c)| (id.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

fn validate(site_id: &str, c: &SiteConstants) -> Result<()> {
    if c.sellable_racks == 0 {
        return Err(CapacityError::invalid_constant(
            site_id,
            "sellable_racks",
            "must be greater than zero",
        ));
    }

    let positive = [
        ("contract_density_kw_per_rack", c.contract_density_kw_per_rack),
        ("design_it_capacity_kw", c.design_it_capacity_kw),
        ("design_total_load_kw", c.design_total_load_kw),
        ("rack_footprint_m2", c.rack_footprint_m2),
        ("gross_white_space_m2", c.gross_white_space_m2),
    ];
    for (field, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(CapacityError::invalid_constant(
                site_id,
                field,
                format!("must be a positive number, got {}", value),
            ));
        }
    }

    if !c.design_pue.is_finite() || c.design_pue < 1.0 {
        return Err(CapacityError::invalid_constant(
            site_id,
            "design_pue",
            format!("must be at least 1.0, got {}", c.design_pue),
        ));
    }

    if !c.carbon_factor_t_per_kwh.is_finite() || c.carbon_factor_t_per_kwh < 0.0 {
        return Err(CapacityError::invalid_constant(
            site_id,
            "carbon_factor_t_per_kwh",
            format!("must be non-negative, got {}", c.carbon_factor_t_per_kwh),
        ));
    }

    // Cooling and overhead cannot be negative at design point
    if c.design_total_load_kw < c.design_it_capacity_kw {
        return Err(CapacityError::invalid_constant(
            site_id,
            "design_total_load_kw",
            format!(
                "{} kW is below design IT capacity {} kW",
                c.design_total_load_kw, c.design_it_capacity_kw
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn kenya() -> SiteConstants {
        SiteConstants {
            sellable_racks: 186,
            contract_density_kw_per_rack: 5.0,
            design_it_capacity_kw: 640.0,
            design_total_load_kw: 900.0,
            design_pue: 1.5,
            rack_footprint_m2: 2.5,
            gross_white_space_m2: 800.0,
            carbon_factor_t_per_kwh: 0.0004,
        }
    }

    #[test]
    fn test_lookup_known_and_unknown_site() {
        let registry = SiteRegistry::new([("KenyaDC".to_string(), kenya())]).unwrap();
        assert_eq!(registry.get("KenyaDC").unwrap().sellable_racks, 186);
        assert!(registry.contains("KenyaDC"));
        assert_eq!(registry.len(), 1);

        let err = registry.get("MarsDC").unwrap_err();
        assert!(matches!(err, CapacityError::UnknownSite { ref site_id } if site_id == "MarsDC"));
    }

    #[test]
    fn test_rejects_total_load_below_it_capacity() {
        let mut bad = kenya();
        bad.design_total_load_kw = 600.0;
        let err = SiteRegistry::new([("KenyaDC".to_string(), bad)]).unwrap_err();
        assert!(matches!(
            err,
            CapacityError::InvalidSiteConstant { field: "design_total_load_kw", .. }
        ));
    }

    #[test]
    fn test_rejects_non_positive_constants() {
        let mut bad = kenya();
        bad.rack_footprint_m2 = 0.0;
        assert!(SiteRegistry::new([("KenyaDC".to_string(), bad)]).is_err());

        let mut bad = kenya();
        bad.sellable_racks = 0;
        assert!(SiteRegistry::new([("KenyaDC".to_string(), bad)]).is_err());

        let mut bad = kenya();
        bad.design_pue = 0.9;
        assert!(SiteRegistry::new([("KenyaDC".to_string(), bad)]).is_err());

        let mut bad = kenya();
        bad.carbon_factor_t_per_kwh = -0.1;
        assert!(SiteRegistry::new([("KenyaDC".to_string(), bad)]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_site() {
        let mut other = kenya();
        other.sellable_racks = 10;
        let err = SiteRegistry::new([
            ("KenyaDC".to_string(), kenya()),
            ("KenyaDC".to_string(), other),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            CapacityError::InvalidSiteConstant { ref site_id, field: "site_id", .. } if site_id == "KenyaDC"
        ));
    }

    #[test]
    fn test_advisory_design_pue_not_enforced() {
        // 900 / 640 = 1.406, configured 1.5 is accepted as-is
        let registry = SiteRegistry::new([("KenyaDC".to_string(), kenya())]).unwrap();
        assert_eq!(registry.get("KenyaDC").unwrap().design_pue, 1.5);
    }

    #[test]
    fn test_site_ids_sorted() {
        let registry = SiteRegistry::new([
            ("UgandaDC".to_string(), kenya()),
            ("KenyaDC".to_string(), kenya()),
        ])
        .unwrap();
        let ids: Vec<_> = registry.site_ids().collect();
        assert_eq!(ids, vec!["KenyaDC", "UgandaDC"]);
    }
}
