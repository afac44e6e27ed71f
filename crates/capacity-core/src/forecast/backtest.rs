//! Holdout backtest: refit on all but the last periods, score the rest

use super::{ForecastEngine, MetricSeries, MIN_HISTORY};
use crate::error::{CapacityError, Result};
use crate::models::{ForecastPoint, Observation, PointKind, QualityScore};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trailing periods held out for scoring
pub const DEFAULT_HOLDOUT_PERIODS: usize = 3;

/// Shorter series get a degraded score instead of a backtest
pub const MIN_BACKTEST_PERIODS: usize = 6;

/// Mean absolute percentage error as a fraction (0.05 is 5%)
///
/// Zero actuals are divided by machine epsilon instead.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, y_hat)| (y - y_hat).abs() / y.abs().max(f64::EPSILON))
        .sum();
    total / n as f64
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, y_hat)| (y - y_hat).powi(2))
        .sum();
    (sse / n as f64).sqrt()
}

/// Scores an engine against the tail of each series
pub struct BacktestEvaluator {
    engine: Arc<dyn ForecastEngine>,
    holdout: usize,
    min_periods: usize,
}

impl BacktestEvaluator {
    pub fn new(engine: Arc<dyn ForecastEngine>) -> Self {
        Self {
            engine,
            holdout: DEFAULT_HOLDOUT_PERIODS,
            min_periods: MIN_BACKTEST_PERIODS,
        }
    }

    /// Override the holdout size and minimum series length
    pub fn with_holdout(mut self, holdout: usize, min_periods: usize) -> Result<Self> {
        if holdout == 0 {
            return Err(CapacityError::invalid_config(
                "holdout_periods",
                "must hold out at least one period",
            ));
        }
        if min_periods < holdout + MIN_HISTORY {
            return Err(CapacityError::invalid_config(
                "min_backtest_periods",
                format!(
                    "must be at least holdout_periods + {} ({}), got {}",
                    MIN_HISTORY,
                    holdout + MIN_HISTORY,
                    min_periods
                ),
            ));
        }
        self.holdout = holdout;
        self.min_periods = min_periods;
        Ok(self)
    }

    pub fn holdout(&self) -> usize {
        self.holdout
    }

    /// Score one series
    ///
    /// Short series and forecasts that miss every held-out timestamp yield a
    /// degraded score. Engine failures on the training slice propagate.
    pub fn evaluate(&self, series: &MetricSeries) -> Result<QualityScore> {
        if series.len() < self.min_periods {
            debug!(
                site_id = %series.site_id(),
                metric = %series.metric(),
                periods = series.len(),
                required = self.min_periods,
                "Series too short to backtest"
            );
            return Ok(QualityScore::degraded(series.site_id(), series.metric()));
        }

        let (train, test) = series.split_at(series.len() - self.holdout);
        let forecast = self
            .engine
            .fit_predict(&train, self.holdout as u32, series.cadence())?;

        match align(test, &forecast) {
            Ok((actual, predicted)) => Ok(QualityScore {
                metric_name: series.metric(),
                site_id: series.site_id().to_string(),
                mape: Some(mape(&actual, &predicted)),
                rmse: Some(rmse(&actual, &predicted)),
                matched_periods: actual.len(),
            }),
            Err(CapacityError::Alignment) => {
                debug!(
                    site_id = %series.site_id(),
                    metric = %series.metric(),
                    "Forecast timestamps missed the holdout"
                );
                Ok(QualityScore::degraded(series.site_id(), series.metric()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Inner join of held-out actuals with forecast points on timestamp
fn align(test: &[Observation], forecast: &[ForecastPoint]) -> Result<(Vec<f64>, Vec<f64>)> {
    let by_timestamp: HashMap<NaiveDate, f64> = forecast
        .iter()
        .filter(|p| p.kind == PointKind::Forecast)
        .map(|p| (p.timestamp, p.point_estimate))
        .collect();

    let (actual, predicted): (Vec<f64>, Vec<f64>) = test
        .iter()
        .filter_map(|o| by_timestamp.get(&o.timestamp).map(|y_hat| (o.value, *y_hat)))
        .unzip();

    if actual.is_empty() {
        return Err(CapacityError::Alignment);
    }
    Ok((actual, predicted))
}
