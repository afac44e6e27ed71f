//! Interval-violation detector
//!
//! Refits the engine on the full history (no holdout) and compares each
//! actual against the in-sample interval at its own timestamp.

use crate::error::Result;
use crate::forecast::{ForecastEngine, MetricSeries};
use crate::models::{AnomalyRecord, ForecastPoint, PointKind};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Relative slack outside the interval before a point counts as a violation
pub const ANOMALY_TOLERANCE: f64 = 1e-9;

/// Detects interval violations in a series' own history
pub struct AnomalyDetector {
    engine: Arc<dyn ForecastEngine>,
}

impl AnomalyDetector {
    pub fn new(engine: Arc<dyn ForecastEngine>) -> Self {
        Self { engine }
    }

    /// Every observation lying outside its in-sample interval
    ///
    /// An empty result means no violations; it is not an error.
    pub fn detect(&self, series: &MetricSeries) -> Result<Vec<AnomalyRecord>> {
        let fitted = self.engine.fit_predict(series, 0, series.cadence())?;
        let in_sample: HashMap<NaiveDate, &ForecastPoint> = fitted
            .iter()
            .filter(|p| p.kind == PointKind::InSample)
            .map(|p| (p.timestamp, p))
            .collect();

        let anomalies: Vec<AnomalyRecord> = series
            .observations()
            .iter()
            .filter_map(|obs| {
                let point = in_sample.get(&obs.timestamp)?;
                let slack = ANOMALY_TOLERANCE * obs.value.abs().max(1.0);
                let outside = obs.value < point.lower_bound - slack
                    || obs.value > point.upper_bound + slack;
                outside.then(|| AnomalyRecord {
                    timestamp: obs.timestamp,
                    metric_name: series.metric(),
                    site_id: series.site_id().to_string(),
                    actual: obs.value,
                    point_estimate: point.point_estimate,
                    lower_bound: point.lower_bound,
                    upper_bound: point.upper_bound,
                })
            })
            .collect();

        debug!(
            site_id = %series.site_id(),
            metric = %series.metric(),
            engine = self.engine.name(),
            checked = series.len(),
            flagged = anomalies.len(),
            "Anomaly scan complete"
        );
        Ok(anomalies)
    }
}
