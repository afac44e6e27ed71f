//! Pipeline settings: the metric/horizon cross product and evaluation knobs

use crate::calendar::PeriodCadence;
use crate::enrichment::AlertThresholds;
use crate::error::{CapacityError, Result};
use crate::forecast::{DEFAULT_COVERAGE, DEFAULT_HOLDOUT_PERIODS, MIN_BACKTEST_PERIODS, MIN_HISTORY};
use crate::models::{Horizon, KpiMetric};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default number of site/metric pairs fitted concurrently
pub const DEFAULT_MAX_PARALLEL_PAIRS: usize = 4;

/// `[forecast]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Metrics forecast for every site
    #[serde(default = "KpiMetric::default_set")]
    pub metrics: Vec<KpiMetric>,

    /// Forecast lengths, each producing its own tagged rows
    #[serde(default = "Horizon::default_set")]
    pub horizons: Vec<Horizon>,

    #[serde(default)]
    pub cadence: PeriodCadence,

    /// Nominal prediction interval coverage
    #[serde(default = "default_coverage")]
    pub coverage: f64,

    #[serde(default = "default_holdout_periods")]
    pub holdout_periods: usize,

    #[serde(default = "default_min_backtest_periods")]
    pub min_backtest_periods: usize,

    #[serde(default = "default_max_parallel_pairs")]
    pub max_parallel_pairs: usize,
}

fn default_coverage() -> f64 {
    DEFAULT_COVERAGE
}

fn default_holdout_periods() -> usize {
    DEFAULT_HOLDOUT_PERIODS
}

fn default_min_backtest_periods() -> usize {
    MIN_BACKTEST_PERIODS
}

fn default_max_parallel_pairs() -> usize {
    DEFAULT_MAX_PARALLEL_PAIRS
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            metrics: KpiMetric::default_set(),
            horizons: Horizon::default_set(),
            cadence: PeriodCadence::default(),
            coverage: DEFAULT_COVERAGE,
            holdout_periods: DEFAULT_HOLDOUT_PERIODS,
            min_backtest_periods: MIN_BACKTEST_PERIODS,
            max_parallel_pairs: DEFAULT_MAX_PARALLEL_PAIRS,
        }
    }
}

impl ForecastSettings {
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(CapacityError::invalid_config("forecast.metrics", "list is empty"));
        }
        if self.horizons.is_empty() {
            return Err(CapacityError::invalid_config("forecast.horizons", "list is empty"));
        }

        let mut metrics = HashSet::new();
        for metric in &self.metrics {
            if !metrics.insert(*metric) {
                return Err(CapacityError::invalid_config(
                    "forecast.metrics",
                    format!("duplicate metric '{}'", metric),
                ));
            }
        }

        let mut labels = HashSet::new();
        for horizon in &self.horizons {
            if horizon.periods == 0 {
                return Err(CapacityError::invalid_config(
                    "forecast.horizons",
                    format!("horizon '{}' has zero periods", horizon.label),
                ));
            }
            if !labels.insert(horizon.label.as_str()) {
                return Err(CapacityError::invalid_config(
                    "forecast.horizons",
                    format!("duplicate label '{}'", horizon.label),
                ));
            }
        }

        if !(self.coverage > 0.0 && self.coverage < 1.0) {
            return Err(CapacityError::invalid_config(
                "forecast.coverage",
                format!("must lie strictly between 0 and 1, got {}", self.coverage),
            ));
        }
        if self.holdout_periods == 0 {
            return Err(CapacityError::invalid_config(
                "forecast.holdout_periods",
                "must hold out at least one period",
            ));
        }
        if self.min_backtest_periods < self.holdout_periods + MIN_HISTORY {
            return Err(CapacityError::invalid_config(
                "forecast.min_backtest_periods",
                format!(
                    "must be at least holdout_periods + {}, got {}",
                    MIN_HISTORY, self.min_backtest_periods
                ),
            ));
        }
        if self.max_parallel_pairs == 0 {
            return Err(CapacityError::invalid_config(
                "forecast.max_parallel_pairs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Everything the orchestrator needs besides the site registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub alerts: AlertThresholds,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.forecast.validate()?;
        let thresholds = [
            ("alerts.space_fill", self.alerts.space_fill),
            ("alerts.power_fill", self.alerts.power_fill),
            ("alerts.design_utilization", self.alerts.design_utilization),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(CapacityError::invalid_config(
                    field,
                    format!("must be a positive fraction, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.forecast.metrics.len(), 6);
        assert_eq!(config.forecast.horizons.len(), 3);
        assert_eq!(config.forecast.cadence, PeriodCadence::Monthly);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"forecast": {"metrics": ["pue"], "cadence": "daily"}}"#).unwrap();
        assert_eq!(config.forecast.metrics, vec![KpiMetric::Pue]);
        assert_eq!(config.forecast.cadence, PeriodCadence::Daily);
        assert_eq!(config.forecast.holdout_periods, 3);
        assert_eq!(config.alerts, AlertThresholds::default());
    }

    #[test]
    fn test_zero_period_horizon_rejected() {
        let mut config = PipelineConfig::default();
        config.forecast.horizons.push(Horizon::new(0, "now"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_horizon_label_rejected() {
        let mut config = PipelineConfig::default();
        config.forecast.horizons.push(Horizon::new(36, "6m"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let mut config = PipelineConfig::default();
        config.forecast.metrics.push(KpiMetric::AvgItLoadKw);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CapacityError::InvalidConfig { field: "forecast.metrics", .. }));
    }

    #[test]
    fn test_backtest_settings_checked() {
        let mut config = PipelineConfig::default();
        config.forecast.min_backtest_periods = 4;
        assert!(config.validate().is_err());
        config.forecast.min_backtest_periods = 5;
        config.validate().unwrap();
    }
}
