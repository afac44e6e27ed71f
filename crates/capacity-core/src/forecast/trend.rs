//! Default forecasting engine: linear trend plus additive seasonality
//!
//! The fit runs in two passes. A Theil-Sen line and per-phase medians give a
//! robust first decomposition; points whose residual lies more than
//! [`OUTLIER_CUTOFF`] robust standard deviations from the median residual are
//! set aside. The least-squares trend, the seasonal profile and the residual
//! scale are then refitted on the remaining points, so one spike neither
//! drags its seasonal phase nor widens every interval. Intervals are normal
//! prediction intervals around the fitted line, widening with distance from
//! the centre of the history.

use super::{assemble_points, check_history, ForecastEngine, MetricSeries, MIN_HISTORY};
use crate::calendar::PeriodCadence;
use crate::error::{CapacityError, Result};
use crate::models::ForecastPoint;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

/// Nominal interval coverage
pub const DEFAULT_COVERAGE: f64 = 0.80;

/// Full seasonal cycles needed before a seasonal profile is fitted
pub const MIN_SEASONAL_CYCLES: usize = 2;

/// Robust z-score beyond which a point is left out of the refit
pub const OUTLIER_CUTOFF: f64 = 3.5;

/// MAD to standard deviation under normality
const NORMAL_CONSISTENCY: f64 = 1.4826;

/// Relative residual treated as zero when the robust scale collapses
const EXACT_FIT_TOLERANCE: f64 = 1e-9;

/// Trend + seasonal decomposition with normal prediction intervals
#[derive(Debug, Clone)]
pub struct TrendSeasonalEngine {
    z: f64,
}

impl TrendSeasonalEngine {
    /// Engine whose intervals have nominal `coverage` in (0, 1)
    pub fn new(coverage: f64) -> Result<Self> {
        if !(coverage > 0.0 && coverage < 1.0) {
            return Err(CapacityError::invalid_config(
                "coverage",
                format!("must lie strictly between 0 and 1, got {}", coverage),
            ));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|e| CapacityError::Model(e.to_string()))?;
        let z = normal.inverse_cdf(0.5 + coverage / 2.0);
        Ok(Self { z })
    }
}

impl Default for TrendSeasonalEngine {
    fn default() -> Self {
        // z for the 80% two-sided interval
        Self {
            z: 1.281_551_565_544_600_5,
        }
    }
}

/// Fitted components of one series
struct Fit {
    slope: f64,
    intercept: f64,
    seasonal: Option<Vec<f64>>,
    residual_std: f64,
    /// Points the final fit was computed from
    n: usize,
    outliers: usize,
    x_mean: f64,
    sxx: f64,
}

impl Fit {
    fn estimate(&self, index: usize) -> f64 {
        let trend = self.intercept + self.slope * index as f64;
        match &self.seasonal {
            Some(profile) => trend + profile[index % profile.len()],
            None => trend,
        }
    }

    fn half_width(&self, index: usize, z: f64) -> f64 {
        let n = self.n as f64;
        let dx = index as f64 - self.x_mean;
        let leverage = if self.sxx > 0.0 { dx * dx / self.sxx } else { 0.0 };
        z * self.residual_std * (1.0 + 1.0 / n + leverage).sqrt()
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    }
}

/// Median pairwise slope and median intercept: (slope, intercept)
fn theil_sen(values: &[f64]) -> (f64, f64) {
    let mut slopes = Vec::with_capacity(values.len() * values.len().saturating_sub(1) / 2);
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            slopes.push((values[j] - values[i]) / (j - i) as f64);
        }
    }
    let slope = median(&slopes).unwrap_or(0.0);
    let offsets: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, y)| y - slope * i as f64)
        .collect();
    (slope, median(&offsets).unwrap_or(0.0))
}

/// Least-squares line through `(index, value)` pairs: (slope, intercept)
fn least_squares_at(points: &[(usize, f64)]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(i, _)| *i as f64).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(i, _)| (*i as f64 - x_mean).powi(2)).sum();
    if sxx < f64::EPSILON {
        return (0.0, y_mean);
    }
    let sxy: f64 = points
        .iter()
        .map(|(i, y)| (*i as f64 - x_mean) * (y - y_mean))
        .sum();
    let slope = sxy / sxx;
    (slope, y_mean - slope * x_mean)
}

/// Centred per-phase median of the detrended points
///
/// A phase with no points takes its value from `fallback`, or zero.
fn seasonal_profile(
    points: &[(usize, f64)],
    slope: f64,
    intercept: f64,
    period: usize,
    fallback: Option<&[f64]>,
) -> Vec<f64> {
    let mut phases: Vec<Vec<f64>> = vec![Vec::new(); period];
    for (i, y) in points {
        phases[i % period].push(y - (intercept + slope * *i as f64));
    }
    let mut profile: Vec<f64> = phases
        .iter()
        .enumerate()
        .map(|(phase, detrended)| {
            median(detrended)
                .or_else(|| fallback.map(|f| f[phase]))
                .unwrap_or(0.0)
        })
        .collect();
    let centre = profile.iter().sum::<f64>() / period as f64;
    profile.iter_mut().for_each(|p| *p -= centre);
    profile
}

/// Indices whose residual is within the robust cutoff of the median residual
fn screen(residuals: &[f64], magnitude: f64) -> Vec<bool> {
    let centre = median(residuals).unwrap_or(0.0);
    let deviations: Vec<f64> = residuals.iter().map(|r| (r - centre).abs()).collect();
    let scale = median(&deviations).unwrap_or(0.0) * NORMAL_CONSISTENCY;
    let cutoff = if scale > 0.0 {
        OUTLIER_CUTOFF * scale
    } else {
        EXACT_FIT_TOLERANCE * magnitude.max(1.0)
    };
    deviations.iter().map(|d| *d <= cutoff).collect()
}

fn fit(values: &[f64], period: usize) -> Fit {
    let n = values.len();
    let seasonal = period > 1 && n >= period * MIN_SEASONAL_CYCLES;
    let magnitude = values.iter().fold(0.0_f64, |m, y| m.max(y.abs()));
    let all: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();

    // First pass: robust decomposition over every point
    let (rough_slope, rough_intercept) = theil_sen(values);
    let rough_profile = seasonal.then(|| {
        let detrended: Vec<f64> = all
            .iter()
            .map(|(i, y)| y - (rough_intercept + rough_slope * *i as f64))
            .collect();
        // Phase medians from points that already look ordinary, falling back
        // to the whole phase when none do
        let ordinary = screen(&detrended, magnitude);
        let kept: Vec<(usize, f64)> = all
            .iter()
            .zip(&ordinary)
            .filter_map(|(p, ok)| ok.then_some(*p))
            .collect();
        let whole = seasonal_profile(&all, rough_slope, rough_intercept, period, None);
        seasonal_profile(&kept, rough_slope, rough_intercept, period, Some(whole.as_slice()))
    });
    let rough_residuals: Vec<f64> = all
        .iter()
        .map(|(i, y)| {
            let season = rough_profile.as_ref().map_or(0.0, |p| p[i % period]);
            y - (rough_intercept + rough_slope * *i as f64) - season
        })
        .collect();

    let keep = screen(&rough_residuals, magnitude);
    let mut inliers: Vec<(usize, f64)> = all
        .iter()
        .zip(&keep)
        .filter_map(|(p, ok)| ok.then_some(*p))
        .collect();
    if inliers.len() < MIN_HISTORY {
        inliers = all.clone();
    }

    // Second pass: classical fit on the inliers
    let (slope, intercept) = least_squares_at(&inliers);
    let profile = rough_profile.as_ref().map(|rough| {
        seasonal_profile(&inliers, slope, intercept, period, Some(rough.as_slice()))
    });

    let m = inliers.len();
    let x_mean = inliers.iter().map(|(i, _)| *i as f64).sum::<f64>() / m as f64;
    let mut fitted = Fit {
        slope,
        intercept,
        seasonal: profile,
        residual_std: 0.0,
        n: m,
        outliers: n - m,
        x_mean,
        sxx: inliers.iter().map(|(i, _)| (*i as f64 - x_mean).powi(2)).sum(),
    };

    let parameters = 2 + fitted.seasonal.as_ref().map_or(0, |p| p.len() - 1);
    let dof = m.saturating_sub(parameters).max(1) as f64;
    let sse: f64 = inliers
        .iter()
        .map(|(i, y)| (y - fitted.estimate(*i)).powi(2))
        .sum();
    fitted.residual_std = (sse / dof).sqrt();
    fitted
}

impl ForecastEngine for TrendSeasonalEngine {
    fn fit_predict(
        &self,
        series: &MetricSeries,
        horizon_periods: u32,
        cadence: PeriodCadence,
    ) -> Result<Vec<ForecastPoint>> {
        check_history(series)?;

        let values = series.values();
        let model = fit(&values, cadence.seasonal_period());
        if !model.residual_std.is_finite() || !model.slope.is_finite() {
            return Err(CapacityError::Model(format!(
                "non-finite fit for {} at {}",
                series.metric(),
                series.site_id()
            )));
        }

        debug!(
            site_id = %series.site_id(),
            metric = %series.metric(),
            periods = values.len(),
            seasonal = model.seasonal.is_some(),
            outliers = model.outliers,
            slope = model.slope,
            residual_std = model.residual_std,
            "Trend model fitted"
        );

        assemble_points(series, horizon_periods, cadence, |index| {
            (model.estimate(index), model.half_width(index, self.z))
        })
    }

    fn name(&self) -> &str {
        "trend_seasonal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KpiMetric, Observation, PointKind};
    use chrono::NaiveDate;

    fn monthly_series(values: &[f64]) -> MetricSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation {
                timestamp: PeriodCadence::Monthly.advance(start, i as u32).unwrap(),
                value: *v,
            })
            .collect();
        MetricSeries::new("KenyaDC", KpiMetric::AvgItLoadKw, PeriodCadence::Monthly, observations)
            .unwrap()
    }

    #[test]
    fn test_insufficient_history() {
        let engine = TrendSeasonalEngine::default();
        let err = engine
            .fit_predict(&monthly_series(&[10.0]), 6, PeriodCadence::Monthly)
            .unwrap_err();
        assert_eq!(err, CapacityError::InsufficientHistory { required: 2, actual: 1 });
    }

    #[test]
    fn test_two_points_extrapolate() {
        let engine = TrendSeasonalEngine::default();
        let points = engine
            .fit_predict(&monthly_series(&[10.0, 12.0]), 2, PeriodCadence::Monthly)
            .unwrap();
        assert_eq!(points.len(), 4);
        assert!((points[3].point_estimate - 16.0).abs() < 1e-9);
        assert_eq!(points[3].kind, PointKind::Forecast);
        assert_eq!(points[1].kind, PointKind::InSample);
    }

    #[test]
    fn test_output_covers_history_and_horizon() {
        let engine = TrendSeasonalEngine::default();
        let series = monthly_series(&[100.0, 104.0, 103.0, 108.0, 110.0, 111.0, 115.0]);
        let points = engine.fit_predict(&series, 6, PeriodCadence::Monthly).unwrap();

        assert_eq!(points.len(), 13);
        for (point, obs) in points.iter().zip(series.observations()) {
            assert_eq!(point.timestamp, obs.timestamp);
        }
        assert_eq!(
            points.last().unwrap().timestamp,
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()
        );
        assert!(points.iter().all(|p| p.site_id == "KenyaDC"));
        assert!(points.iter().all(|p| p.horizon_label.is_none()));
    }

    #[test]
    fn test_bounds_ordered_and_widening() {
        let engine = TrendSeasonalEngine::default();
        let series = monthly_series(&[50.0, 53.0, 51.0, 56.0, 58.0, 57.0, 61.0, 60.0]);
        let points = engine.fit_predict(&series, 24, PeriodCadence::Monthly).unwrap();

        assert!(points.iter().all(|p| p.is_well_ordered()));
        let widths: Vec<f64> = points
            .iter()
            .filter(|p| p.kind == PointKind::Forecast)
            .map(|p| p.upper_bound - p.lower_bound)
            .collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_seasonal_profile_recovered() {
        // Linear growth plus a repeating 12-month bump, three full years
        let values: Vec<f64> = (0..36)
            .map(|i| 200.0 + 2.0 * i as f64 + if i % 12 == 6 { 30.0 } else { 0.0 })
            .collect();
        let engine = TrendSeasonalEngine::default();
        let points = engine
            .fit_predict(&monthly_series(&values), 12, PeriodCadence::Monthly)
            .unwrap();

        // Period index 42 is phase 6 of the fourth year
        let july = &points[42];
        let june = &points[41];
        assert!(july.point_estimate - june.point_estimate > 20.0);
    }

    #[test]
    fn test_spike_does_not_shift_its_phase() {
        let mut values: Vec<f64> = (0..24)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        values[12] = 1010.0;
        let engine = TrendSeasonalEngine::default();
        let points = engine
            .fit_predict(&monthly_series(&values), 12, PeriodCadence::Monthly)
            .unwrap();

        // Same phase as the spike, one year either side
        assert!((points[0].point_estimate - 101.0).abs() < 1.0);
        assert!((points[24].point_estimate - 101.0).abs() < 1.0);
        assert!(points[12].upper_bound < 110.0);
        assert!(points.iter().all(|p| p.is_well_ordered()));
    }

    #[test]
    fn test_robust_helpers() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));

        let (slope, intercept) = theil_sen(&[1.0, 3.0, 5.0, 7.0, 90.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);

        let keep = screen(&[0.1, -0.2, 0.0, 0.15, 50.0], 50.0);
        assert_eq!(keep, vec![true, true, true, true, false]);
    }

    #[test]
    fn test_perfect_line_has_zero_width() {
        let engine = TrendSeasonalEngine::default();
        let points = engine
            .fit_predict(&monthly_series(&[1.0, 2.0, 3.0, 4.0]), 1, PeriodCadence::Monthly)
            .unwrap();
        for p in &points {
            assert!((p.upper_bound - p.lower_bound).abs() < 1e-9);
            assert!(p.is_well_ordered());
        }
    }

    #[test]
    fn test_coverage_validation() {
        assert!(TrendSeasonalEngine::new(0.0).is_err());
        assert!(TrendSeasonalEngine::new(1.0).is_err());
        assert!(TrendSeasonalEngine::new(f64::NAN).is_err());

        let engine = TrendSeasonalEngine::new(0.80).unwrap();
        assert!((engine.z - TrendSeasonalEngine::default().z).abs() < 1e-6);
        let wide = TrendSeasonalEngine::new(0.95).unwrap();
        assert!((wide.z - 1.959_963_985).abs() < 1e-6);
    }

    #[test]
    fn test_stateless_across_calls() {
        let engine = TrendSeasonalEngine::default();
        let a = monthly_series(&[1.0, 3.0, 2.0, 5.0]);
        let b = monthly_series(&[100.0, 90.0, 80.0, 70.0]);
        let first = engine.fit_predict(&a, 3, PeriodCadence::Monthly).unwrap();
        engine.fit_predict(&b, 3, PeriodCadence::Monthly).unwrap();
        let again = engine.fit_predict(&a, 3, PeriodCadence::Monthly).unwrap();
        assert_eq!(first, again);
    }
}
