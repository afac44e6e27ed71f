//! Deterministic engine: least-squares line with a constant band
//!
//! Used to exercise pipeline logic without statistical fitting.

use super::{assemble_points, check_history, least_squares, ForecastEngine, MetricSeries};
use crate::calendar::PeriodCadence;
use crate::error::{CapacityError, Result};
use crate::models::ForecastPoint;

/// Linear extrapolation with a fixed-width interval
#[derive(Debug, Clone)]
pub struct FixedBandEngine {
    half_width: f64,
}

impl FixedBandEngine {
    pub fn new(half_width: f64) -> Result<Self> {
        if !half_width.is_finite() || half_width < 0.0 {
            return Err(CapacityError::invalid_config(
                "half_width",
                format!("must be a non-negative number, got {}", half_width),
            ));
        }
        Ok(Self { half_width })
    }
}

impl Default for FixedBandEngine {
    fn default() -> Self {
        Self { half_width: 1.0 }
    }
}

impl ForecastEngine for FixedBandEngine {
    fn fit_predict(
        &self,
        series: &MetricSeries,
        horizon_periods: u32,
        cadence: PeriodCadence,
    ) -> Result<Vec<ForecastPoint>> {
        check_history(series)?;
        let (slope, intercept) = least_squares(&series.values());
        assemble_points(series, horizon_periods, cadence, |index| {
            (intercept + slope * index as f64, self.half_width)
        })
    }

    fn name(&self) -> &str {
        "fixed_band"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KpiMetric, Observation};
    use chrono::NaiveDate;

    #[test]
    fn test_constant_band_around_line() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let observations = (0..5)
            .map(|i| Observation {
                timestamp: PeriodCadence::Daily.advance(start, i).unwrap(),
                value: 10.0 + i as f64,
            })
            .collect();
        let series =
            MetricSeries::new("KenyaDC", KpiMetric::Pue, PeriodCadence::Daily, observations).unwrap();

        let engine = FixedBandEngine::new(0.5).unwrap();
        let points = engine.fit_predict(&series, 2, PeriodCadence::Daily).unwrap();

        assert_eq!(points.len(), 7);
        let last = points.last().unwrap();
        assert_eq!(last.timestamp, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert!((last.point_estimate - 16.0).abs() < 1e-9);
        for p in &points {
            assert!((p.upper_bound - p.lower_bound - 1.0).abs() < 1e-9);
            assert!(p.is_well_ordered());
        }
    }

    #[test]
    fn test_rejects_negative_width() {
        assert!(FixedBandEngine::new(-1.0).is_err());
        assert!(FixedBandEngine::new(f64::INFINITY).is_err());
    }
}
