//! Capacity reporting core for colocation data centers
//!
//! This crate provides:
//! - KPI enrichment of raw utilization records against per-site design constants
//! - Capacity threshold alerts
//! - Pluggable time-series forecasting with holdout backtests
//! - In-sample anomaly detection
//! - A pipeline orchestrator over the site × metric × horizon cross product
//! - Prometheus metrics and structured event logging

pub mod anomaly;
pub mod calendar;
pub mod enrichment;
pub mod error;
pub mod forecast;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod registry;

pub use calendar::PeriodCadence;
pub use error::{CapacityError, ErrorKind, Result};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{Diagnostic, Pipeline, PipelineConfig, PipelineOutput};
pub use registry::SiteRegistry;
