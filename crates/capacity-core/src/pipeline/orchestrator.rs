//! Cross-product driver: enrichment, then per-(site, metric) forecasting
//!
//! Each (site, metric) pair runs as its own blocking task. A failing pair
//! becomes a diagnostic row; it never aborts the run.

use super::config::PipelineConfig;
use crate::anomaly::AnomalyDetector;
use crate::enrichment::{KpiEnricher, RejectedRecord};
use crate::error::{CapacityError, ErrorKind, Result};
use crate::forecast::{BacktestEvaluator, ForecastEngine, MetricSeries, TrendSeasonalEngine, MIN_HISTORY};
use crate::models::{
    AnomalyRecord, CapacityAlert, EnrichedRecord, ForecastPoint, KpiMetric, QualityScore, RawRecord,
};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::registry::SiteRegistry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Stage at which a diagnostic was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enrichment,
    Series,
    Forecast,
    Backtest,
    Anomaly,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Enrichment => "enrichment",
            Stage::Series => "series",
            Stage::Forecast => "forecast",
            Stage::Backtest => "backtest",
            Stage::Anomaly => "anomaly",
        }
    }
}

/// One reported failure: a rejected record or a skipped unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metric_name: Option<KpiMetric>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub horizon_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reporting_date: Option<NaiveDate>,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    fn for_pair(
        stage: Stage,
        site_id: &str,
        metric: KpiMetric,
        horizon_label: Option<&str>,
        error: &CapacityError,
    ) -> Self {
        Self {
            stage,
            site_id: site_id.to_string(),
            metric_name: Some(metric),
            horizon_label: horizon_label.map(str::to_string),
            reporting_date: match error {
                CapacityError::DataQuality { reporting_date, .. } => Some(*reporting_date),
                _ => None,
            },
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<&RejectedRecord> for Diagnostic {
    fn from(rejected: &RejectedRecord) -> Self {
        Self {
            stage: Stage::Enrichment,
            site_id: rejected.record.site_id.clone(),
            metric_name: None,
            horizon_label: None,
            reporting_date: Some(rejected.record.reporting_date),
            kind: rejected.error.kind(),
            message: rejected.error.to_string(),
        }
    }
}

/// All output tables of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub enriched: Vec<EnrichedRecord>,
    pub forecasts: Vec<ForecastPoint>,
    pub quality: Vec<QualityScore>,
    pub anomalies: Vec<AnomalyRecord>,
    pub alerts: Vec<CapacityAlert>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Row counts per output table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub enriched: usize,
    pub rejected: usize,
    pub forecasts: usize,
    pub quality: usize,
    pub degraded_quality: usize,
    pub anomalies: usize,
    pub alerts: usize,
    pub diagnostics: usize,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            enriched: self.enriched.len(),
            rejected: self
                .diagnostics
                .iter()
                .filter(|d| d.stage == Stage::Enrichment)
                .count(),
            forecasts: self.forecasts.len(),
            quality: self.quality.len(),
            degraded_quality: self.quality.iter().filter(|q| q.is_degraded()).count(),
            anomalies: self.anomalies.len(),
            alerts: self.alerts.len(),
            diagnostics: self.diagnostics.len(),
        }
    }

    /// Deterministic ordering independent of task completion order
    fn sort(&mut self) {
        self.enriched
            .sort_by(|a, b| (&a.site_id, a.reporting_date).cmp(&(&b.site_id, b.reporting_date)));
        self.forecasts.sort_by(|a, b| {
            (&a.site_id, a.metric_name, &a.horizon_label, a.timestamp).cmp(&(
                &b.site_id,
                b.metric_name,
                &b.horizon_label,
                b.timestamp,
            ))
        });
        self.quality
            .sort_by(|a, b| (&a.site_id, a.metric_name).cmp(&(&b.site_id, b.metric_name)));
        self.anomalies.sort_by(|a, b| {
            (&a.site_id, a.metric_name, a.timestamp).cmp(&(&b.site_id, b.metric_name, b.timestamp))
        });
        self.alerts.sort_by(|a, b| {
            (&a.site_id, a.reporting_date, a.kind.as_str()).cmp(&(
                &b.site_id,
                b.reporting_date,
                b.kind.as_str(),
            ))
        });
        self.diagnostics.sort_by(|a, b| {
            (&a.site_id, a.metric_name, &a.horizon_label, a.stage, a.reporting_date).cmp(&(
                &b.site_id,
                b.metric_name,
                &b.horizon_label,
                b.stage,
                b.reporting_date,
            ))
        });
    }
}

/// Results of one (site, metric) unit
#[derive(Debug, Default)]
struct PairOutcome {
    forecasts: Vec<ForecastPoint>,
    quality: Option<QualityScore>,
    anomalies: Vec<AnomalyRecord>,
    diagnostics: Vec<Diagnostic>,
}

/// Shared, read-only state handed to each pair task
struct PairContext {
    engine: Arc<dyn ForecastEngine>,
    evaluator: BacktestEvaluator,
    detector: AnomalyDetector,
    config: PipelineConfig,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl PairContext {
    /// Count, log and record a skipped unit
    fn report(&self, diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
        self.metrics.inc_pair_failures();
        self.logger.log_pair_failed(
            diagnostic.stage.as_str(),
            &diagnostic.site_id,
            diagnostic.metric_name,
            diagnostic.horizon_label.as_deref(),
            diagnostic.kind,
            &diagnostic.message,
        );
        diagnostics.push(diagnostic);
    }

    fn run_pair(&self, series: &MetricSeries) -> PairOutcome {
        let mut outcome = PairOutcome::default();
        let site_id = series.site_id();
        let metric = series.metric();
        let cadence = self.config.forecast.cadence;

        if series.len() >= MIN_HISTORY {
            for horizon in &self.config.forecast.horizons {
                let started = Instant::now();
                let result = self.engine.fit_predict(series, horizon.periods, cadence);
                self.metrics
                    .observe_fit_latency(started.elapsed().as_secs_f64());
                match result {
                    Ok(points) => {
                        outcome.forecasts.extend(points.into_iter().map(|mut p| {
                            p.horizon_label = Some(horizon.label.clone());
                            p
                        }));
                    }
                    Err(e) => {
                        let diagnostic = Diagnostic::for_pair(
                            Stage::Forecast,
                            site_id,
                            metric,
                            Some(&horizon.label),
                            &e,
                        );
                        self.report(&mut outcome.diagnostics, diagnostic);
                    }
                }
            }
        } else {
            let e = CapacityError::InsufficientHistory {
                required: MIN_HISTORY,
                actual: series.len(),
            };
            let diagnostic = Diagnostic::for_pair(Stage::Forecast, site_id, metric, None, &e);
            self.report(&mut outcome.diagnostics, diagnostic);
        }

        let score = match self.evaluator.evaluate(series) {
            Ok(score) => score,
            Err(e) => {
                let diagnostic = Diagnostic::for_pair(Stage::Backtest, site_id, metric, None, &e);
                self.report(&mut outcome.diagnostics, diagnostic);
                QualityScore::degraded(site_id, metric)
            }
        };
        if score.is_degraded() {
            self.metrics.inc_quality_degraded();
        }
        self.logger.log_quality_scored(&score);
        outcome.quality = Some(score);

        if series.len() >= MIN_HISTORY {
            match self.detector.detect(series) {
                Ok(anomalies) => {
                    for anomaly in &anomalies {
                        self.logger.log_anomaly(anomaly);
                    }
                    self.metrics.add_anomalies(anomalies.len());
                    outcome.anomalies = anomalies;
                }
                Err(e) => {
                    let diagnostic =
                        Diagnostic::for_pair(Stage::Anomaly, site_id, metric, None, &e);
                    self.report(&mut outcome.diagnostics, diagnostic);
                }
            }
        }

        self.metrics.add_forecast_points(outcome.forecasts.len());
        debug!(
            site_id = %site_id,
            metric = %metric,
            forecasts = outcome.forecasts.len(),
            anomalies = outcome.anomalies.len(),
            failures = outcome.diagnostics.len(),
            "Pair finished"
        );
        outcome
    }
}

/// Orchestrates one full reporting run
pub struct Pipeline {
    enricher: KpiEnricher,
    context: Arc<PairContext>,
}

impl Pipeline {
    /// Pipeline using the trend/seasonal engine at the configured coverage
    pub fn new(registry: Arc<SiteRegistry>, config: PipelineConfig) -> Result<Self> {
        let engine = Arc::new(TrendSeasonalEngine::new(config.forecast.coverage)?);
        Self::with_engine(registry, engine, config)
    }

    /// Pipeline using a caller-supplied engine
    pub fn with_engine(
        registry: Arc<SiteRegistry>,
        engine: Arc<dyn ForecastEngine>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let evaluator = BacktestEvaluator::new(engine.clone()).with_holdout(
            config.forecast.holdout_periods,
            config.forecast.min_backtest_periods,
        )?;
        let detector = AnomalyDetector::new(engine.clone());
        let enricher = KpiEnricher::new(registry, config.forecast.cadence);

        Ok(Self {
            enricher,
            context: Arc::new(PairContext {
                engine,
                evaluator,
                detector,
                config,
                metrics: PipelineMetrics::new(),
                logger: StructuredLogger::new(format!("run-{}", chrono::Utc::now().timestamp())),
            }),
        })
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.context.metrics
    }

    /// Run enrichment, alerts and the site × metric × horizon cross product
    pub async fn run(&self, records: &[RawRecord]) -> PipelineOutput {
        let started = Instant::now();
        let ctx = &self.context;
        let settings = &ctx.config.forecast;

        let (enriched, rejected) = self.enricher.enrich_all(records);
        let by_site = group_by_site(&enriched);

        ctx.logger.log_pipeline_started(
            records.len(),
            by_site.len(),
            settings.metrics.len(),
            settings.horizons.len(),
            ctx.engine.name(),
        );
        ctx.metrics.add_records_enriched(enriched.len());
        ctx.metrics.add_records_rejected(rejected.len());

        let mut output = PipelineOutput::default();
        for r in &rejected {
            ctx.logger.log_record_rejected(
                &r.record.site_id,
                r.record.reporting_date,
                r.error.kind(),
                &r.error.to_string(),
            );
            output.diagnostics.push(Diagnostic::from(r));
        }

        for record in &enriched {
            for alert in ctx.config.alerts.evaluate(record) {
                ctx.logger.log_capacity_alert(&alert);
                output.alerts.push(alert);
            }
        }
        ctx.metrics.add_capacity_alerts(output.alerts.len());

        let mut jobs = Vec::new();
        for (site_id, site_records) in &by_site {
            for &metric in &settings.metrics {
                match MetricSeries::from_records(site_id, metric, settings.cadence, site_records) {
                    Ok(series) => jobs.push(series),
                    Err(e) => {
                        let diagnostic =
                            Diagnostic::for_pair(Stage::Series, site_id, metric, None, &e);
                        ctx.report(&mut output.diagnostics, diagnostic);
                    }
                }
            }
        }

        info!(
            pairs = jobs.len(),
            max_parallel = settings.max_parallel_pairs,
            "Dispatching forecast pairs"
        );

        let limiter = Arc::new(Semaphore::new(settings.max_parallel_pairs));
        let mut handles: Vec<(String, KpiMetric, JoinHandle<PairOutcome>)> =
            Vec::with_capacity(jobs.len());
        for series in jobs {
            let Ok(permit) = limiter.clone().acquire_owned().await else {
                break;
            };
            let task_ctx = Arc::clone(&self.context);
            let site_id = series.site_id().to_string();
            let metric = series.metric();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                task_ctx.run_pair(&series)
            });
            handles.push((site_id, metric, handle));
        }

        for (site_id, metric, handle) in handles {
            match handle.await {
                Ok(outcome) => {
                    output.forecasts.extend(outcome.forecasts);
                    output.quality.extend(outcome.quality);
                    output.anomalies.extend(outcome.anomalies);
                    output.diagnostics.extend(outcome.diagnostics);
                }
                Err(join_error) => {
                    let e = CapacityError::Model(format!("pair task failed: {}", join_error));
                    let diagnostic = Diagnostic::for_pair(Stage::Forecast, &site_id, metric, None, &e);
                    ctx.report(&mut output.diagnostics, diagnostic);
                }
            }
        }

        output.enriched = enriched;
        output.sort();

        let summary = output.summary();
        ctx.logger.log_pipeline_completed(
            summary.enriched,
            summary.forecasts,
            summary.quality,
            summary.anomalies,
            summary.alerts,
            summary.diagnostics,
            started.elapsed().as_millis(),
        );
        output
    }
}

fn group_by_site(records: &[EnrichedRecord]) -> BTreeMap<String, Vec<EnrichedRecord>> {
    let mut by_site: BTreeMap<String, Vec<EnrichedRecord>> = BTreeMap::new();
    for record in records {
        by_site
            .entry(record.site_id.clone())
            .or_default()
            .push(record.clone());
    }
    by_site
}
