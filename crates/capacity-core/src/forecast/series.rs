//! Per-(site, metric) series extraction
//!
//! A series is strictly increasing, one value per period, with no gaps.
//! Missing periods are rejected here rather than imputed.

use crate::calendar::PeriodCadence;
use crate::error::{CapacityError, Result};
use crate::models::{EnrichedRecord, KpiMetric, Observation};
use chrono::NaiveDate;

/// Ordered observations of one metric at one site
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    site_id: String,
    metric: KpiMetric,
    cadence: PeriodCadence,
    observations: Vec<Observation>,
}

impl MetricSeries {
    /// Validate and wrap observations that are already in timestamp order
    pub fn new(
        site_id: impl Into<String>,
        metric: KpiMetric,
        cadence: PeriodCadence,
        observations: Vec<Observation>,
    ) -> Result<Self> {
        let site_id = site_id.into();

        for obs in &observations {
            if !obs.value.is_finite() {
                return Err(CapacityError::data_quality(
                    &site_id,
                    obs.timestamp,
                    metric.as_str(),
                    format!("non-finite value {}", obs.value),
                ));
            }
        }

        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].timestamp, pair[1].timestamp);
            let step = cadence.period_index(next) - cadence.period_index(prev);
            let reason = match step {
                1 => continue,
                0 => format!("duplicate {} period ({} and {})", cadence, prev, next),
                s if s < 0 => format!("timestamps out of order ({} after {})", next, prev),
                s => format!("{} missing {} period(s) between {} and {}", s - 1, cadence, prev, next),
            };
            return Err(CapacityError::data_quality(&site_id, next, metric.as_str(), reason));
        }

        Ok(Self {
            site_id,
            metric,
            cadence,
            observations,
        })
    }

    /// Project one metric column of a site's enriched records
    pub fn from_records(
        site_id: &str,
        metric: KpiMetric,
        cadence: PeriodCadence,
        records: &[EnrichedRecord],
    ) -> Result<Self> {
        let mut observations: Vec<Observation> = records
            .iter()
            .filter(|r| r.site_id == site_id)
            .map(|r| Observation {
                timestamp: r.reporting_date,
                value: metric.value(r),
            })
            .collect();
        observations.sort_by_key(|o| o.timestamp);
        Self::new(site_id, metric, cadence, observations)
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn metric(&self) -> KpiMetric {
        self.metric
    }

    pub fn cadence(&self) -> PeriodCadence {
        self.cadence
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.timestamp)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Split into the first `train_len` periods and the remaining observations
    pub fn split_at(&self, train_len: usize) -> (MetricSeries, &[Observation]) {
        let train_len = train_len.min(self.observations.len());
        let train = MetricSeries {
            site_id: self.site_id.clone(),
            metric: self.metric,
            cadence: self.cadence,
            observations: self.observations[..train_len].to_vec(),
        };
        (train, &self.observations[train_len..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn month_end(y: i32, m: u32) -> NaiveDate {
        crate::calendar::month_end(NaiveDate::from_ymd_opt(y, m, 1).unwrap()).unwrap()
    }

    fn obs(y: i32, m: u32, value: f64) -> Observation {
        Observation {
            timestamp: month_end(y, m),
            value,
        }
    }

    #[test]
    fn test_valid_series() {
        let series = MetricSeries::new(
            "KenyaDC",
            KpiMetric::Pue,
            PeriodCadence::Monthly,
            vec![obs(2023, 11, 1.5), obs(2023, 12, 1.6), obs(2024, 1, 1.4)],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.values(), vec![1.5, 1.6, 1.4]);
        assert_eq!(series.last_timestamp(), Some(month_end(2024, 1)));
    }

    #[test]
    fn test_gap_rejected() {
        let err = MetricSeries::new(
            "KenyaDC",
            KpiMetric::Pue,
            PeriodCadence::Monthly,
            vec![obs(2024, 1, 1.5), obs(2024, 3, 1.6)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataQuality);
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_duplicate_period_rejected() {
        let dup = Observation {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            value: 1.5,
        };
        let err = MetricSeries::new(
            "KenyaDC",
            KpiMetric::Pue,
            PeriodCadence::Monthly,
            vec![dup, obs(2024, 1, 1.6)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_split_at() {
        let series = MetricSeries::new(
            "KenyaDC",
            KpiMetric::AvgItLoadKw,
            PeriodCadence::Monthly,
            (1..=6).map(|m| obs(2024, m, m as f64)).collect(),
        )
        .unwrap();
        let (train, test) = series.split_at(3);
        assert_eq!(train.len(), 3);
        assert_eq!(test.len(), 3);
        assert_eq!(test[0].value, 4.0);
        assert_eq!(train.site_id(), "KenyaDC");
    }
}
