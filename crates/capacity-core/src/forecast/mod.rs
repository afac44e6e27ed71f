//! Forecasting engine and backtest evaluation
//!
//! The statistical model sits behind [`ForecastEngine`] so the orchestrator,
//! evaluator and anomaly detector can run against any implementation,
//! including the deterministic [`FixedBandEngine`] used in tests.

mod backtest;
mod fixed_band;
mod series;
mod trend;

pub use backtest::{mape, rmse, BacktestEvaluator, DEFAULT_HOLDOUT_PERIODS, MIN_BACKTEST_PERIODS};
pub use fixed_band::FixedBandEngine;
pub use series::MetricSeries;
pub use trend::{TrendSeasonalEngine, DEFAULT_COVERAGE, MIN_SEASONAL_CYCLES};

use crate::calendar::PeriodCadence;
use crate::error::{CapacityError, Result};
use crate::models::{ForecastPoint, PointKind};
use chrono::NaiveDate;

/// A single point cannot determine a trend
pub const MIN_HISTORY: usize = 2;

/// Pluggable time-series model
///
/// Implementations refit from the given series on every call and keep no
/// state between calls.
pub trait ForecastEngine: Send + Sync {
    /// Fit on `series` and predict its own timestamps plus `horizon_periods`
    /// future periods at `cadence`
    ///
    /// Every returned point satisfies `lower_bound <= point_estimate <= upper_bound`.
    fn fit_predict(
        &self,
        series: &MetricSeries,
        horizon_periods: u32,
        cadence: PeriodCadence,
    ) -> Result<Vec<ForecastPoint>>;

    /// Short model identifier for logs
    fn name(&self) -> &str;
}

/// Fail unless the series has enough periods to fit a trend
pub(crate) fn check_history(series: &MetricSeries) -> Result<()> {
    if series.len() < MIN_HISTORY {
        return Err(CapacityError::InsufficientHistory {
            required: MIN_HISTORY,
            actual: series.len(),
        });
    }
    Ok(())
}

/// Period-aligned timestamps following `last`
pub(crate) fn future_timestamps(
    last: NaiveDate,
    horizon_periods: u32,
    cadence: PeriodCadence,
) -> Result<Vec<NaiveDate>> {
    (1..=horizon_periods)
        .map(|step| {
            cadence.advance(last, step).ok_or_else(|| {
                CapacityError::Model(format!(
                    "cannot place period {} after {} at {} cadence",
                    step, last, cadence
                ))
            })
        })
        .collect()
}

/// Lay a fitted model over the series' own timestamps and the future periods
///
/// `model` maps a period index to `(point_estimate, half_width)`.
pub(crate) fn assemble_points<F>(
    series: &MetricSeries,
    horizon_periods: u32,
    cadence: PeriodCadence,
    model: F,
) -> Result<Vec<ForecastPoint>>
where
    F: Fn(usize) -> (f64, f64),
{
    let last = series
        .last_timestamp()
        .ok_or(CapacityError::InsufficientHistory {
            required: MIN_HISTORY,
            actual: 0,
        })?;
    let future = future_timestamps(last, horizon_periods, cadence)?;

    let in_sample = series
        .observations()
        .iter()
        .map(|o| (o.timestamp, PointKind::InSample));
    let ahead = future.into_iter().map(|ts| (ts, PointKind::Forecast));

    let points = in_sample
        .chain(ahead)
        .enumerate()
        .map(|(index, (timestamp, kind))| {
            let (estimate, half_width) = model(index);
            let half_width = half_width.abs();
            ForecastPoint {
                timestamp,
                point_estimate: estimate,
                lower_bound: estimate - half_width,
                upper_bound: estimate + half_width,
                metric_name: series.metric(),
                site_id: series.site_id().to_string(),
                horizon_label: None,
                kind,
            }
        })
        .collect();
    Ok(points)
}

/// Least-squares line over the period index: returns (slope, intercept)
pub fn least_squares(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return (0.0, sum_y / n);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}
