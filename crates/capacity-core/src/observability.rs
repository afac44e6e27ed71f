//! Observability for pipeline runs
//!
//! Provides:
//! - Prometheus metrics (enrichment counts, forecast output, pair failures, fit latency)
//! - Structured event logging with tracing

use crate::error::ErrorKind;
use crate::models::{AnomalyRecord, CapacityAlert, KpiMetric, QualityScore};
use chrono::NaiveDate;
use prometheus::{register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for engine fit latency (in seconds)
const FIT_LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    records_enriched: IntCounter,
    records_rejected: IntCounter,
    forecast_points: IntCounter,
    pair_failures: IntCounter,
    anomalies_detected: IntCounter,
    capacity_alerts: IntCounter,
    quality_degraded: IntCounter,
    fit_latency_seconds: Histogram,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            records_enriched: register_int_counter!(
                "dcap_records_enriched_total",
                "Raw records successfully enriched"
            )
            .expect("Failed to register records_enriched"),

            records_rejected: register_int_counter!(
                "dcap_records_rejected_total",
                "Raw records rejected during enrichment"
            )
            .expect("Failed to register records_rejected"),

            forecast_points: register_int_counter!(
                "dcap_forecast_points_total",
                "Forecast rows produced across all horizons"
            )
            .expect("Failed to register forecast_points"),

            pair_failures: register_int_counter!(
                "dcap_pair_failures_total",
                "Site/metric/horizon units that failed and were skipped"
            )
            .expect("Failed to register pair_failures"),

            anomalies_detected: register_int_counter!(
                "dcap_anomalies_detected_total",
                "Observations outside their in-sample interval"
            )
            .expect("Failed to register anomalies_detected"),

            capacity_alerts: register_int_counter!(
                "dcap_capacity_alerts_total",
                "Capacity threshold alerts raised"
            )
            .expect("Failed to register capacity_alerts"),

            quality_degraded: register_int_counter!(
                "dcap_quality_degraded_total",
                "Quality scores reported without error metrics"
            )
            .expect("Failed to register quality_degraded"),

            fit_latency_seconds: register_histogram!(
                "dcap_engine_fit_latency_seconds",
                "Time spent in a single forecast engine fit",
                FIT_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fit_latency_seconds"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the process-wide collectors; clones share them.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a handle, registering the collectors on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn add_records_enriched(&self, count: usize) {
        self.inner().records_enriched.inc_by(count as u64);
    }

    pub fn add_records_rejected(&self, count: usize) {
        self.inner().records_rejected.inc_by(count as u64);
    }

    pub fn add_forecast_points(&self, count: usize) {
        self.inner().forecast_points.inc_by(count as u64);
    }

    pub fn inc_pair_failures(&self) {
        self.inner().pair_failures.inc();
    }

    pub fn add_anomalies(&self, count: usize) {
        self.inner().anomalies_detected.inc_by(count as u64);
    }

    pub fn add_capacity_alerts(&self, count: usize) {
        self.inner().capacity_alerts.inc_by(count as u64);
    }

    pub fn inc_quality_degraded(&self) {
        self.inner().quality_degraded.inc();
    }

    pub fn observe_fit_latency(&self, duration_secs: f64) {
        self.inner().fit_latency_seconds.observe(duration_secs);
    }

    pub fn records_enriched(&self) -> u64 {
        self.inner().records_enriched.get()
    }

    pub fn pair_failures(&self) -> u64 {
        self.inner().pair_failures.get()
    }

    /// Render every registered collector in the text exposition format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for pipeline events
///
/// Every record carries a stable `event` field so downstream log queries do
/// not depend on message wording.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log pipeline start
    pub fn log_pipeline_started(
        &self,
        records: usize,
        sites: usize,
        metrics: usize,
        horizons: usize,
        engine: &str,
    ) {
        info!(
            event = "pipeline_started",
            run_id = %self.run_id,
            records = records,
            sites = sites,
            metrics = metrics,
            horizons = horizons,
            engine = %engine,
            "Capacity pipeline started"
        );
    }

    /// Log a row rejected during enrichment
    pub fn log_record_rejected(
        &self,
        site_id: &str,
        reporting_date: NaiveDate,
        kind: ErrorKind,
        reason: &str,
    ) {
        warn!(
            event = "record_rejected",
            run_id = %self.run_id,
            site_id = %site_id,
            reporting_date = %reporting_date,
            kind = %kind,
            reason = %reason,
            "Raw record rejected"
        );
    }

    /// Log a skipped site/metric unit
    pub fn log_pair_failed(
        &self,
        stage: &str,
        site_id: &str,
        metric: Option<KpiMetric>,
        horizon_label: Option<&str>,
        kind: ErrorKind,
        reason: &str,
    ) {
        warn!(
            event = "pair_failed",
            run_id = %self.run_id,
            stage = %stage,
            site_id = %site_id,
            metric = ?metric.map(|m| m.as_str()),
            horizon = ?horizon_label,
            kind = %kind,
            reason = %reason,
            "Forecast unit skipped"
        );
    }

    /// Log a backtest result
    pub fn log_quality_scored(&self, score: &QualityScore) {
        info!(
            event = "quality_scored",
            run_id = %self.run_id,
            site_id = %score.site_id,
            metric = %score.metric_name,
            mape = ?score.mape,
            rmse = ?score.rmse,
            matched_periods = score.matched_periods,
            degraded = score.is_degraded(),
            "Backtest scored"
        );
    }

    /// Log an interval violation
    pub fn log_anomaly(&self, anomaly: &AnomalyRecord) {
        info!(
            event = "anomaly_detected",
            run_id = %self.run_id,
            site_id = %anomaly.site_id,
            metric = %anomaly.metric_name,
            timestamp = %anomaly.timestamp,
            actual = anomaly.actual,
            lower_bound = anomaly.lower_bound,
            upper_bound = anomaly.upper_bound,
            excess = anomaly.excess(),
            "Value outside in-sample interval"
        );
    }

    /// Log a capacity threshold breach
    pub fn log_capacity_alert(&self, alert: &CapacityAlert) {
        warn!(
            event = "capacity_alert",
            run_id = %self.run_id,
            site_id = %alert.site_id,
            reporting_date = %alert.reporting_date,
            kind = %alert.kind.as_str(),
            value = alert.value,
            threshold = alert.threshold,
            "Capacity threshold exceeded"
        );
    }

    /// Log pipeline completion with table sizes
    pub fn log_pipeline_completed(
        &self,
        enriched: usize,
        forecasts: usize,
        quality: usize,
        anomalies: usize,
        alerts: usize,
        diagnostics: usize,
        duration_ms: u128,
    ) {
        info!(
            event = "pipeline_completed",
            run_id = %self.run_id,
            enriched = enriched,
            forecasts = forecasts,
            quality = quality,
            anomalies = anomalies,
            alerts = alerts,
            diagnostics = diagnostics,
            duration_ms = duration_ms as u64,
            "Capacity pipeline completed"
        );
    }
}
