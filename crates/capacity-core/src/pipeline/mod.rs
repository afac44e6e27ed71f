//! Pipeline orchestration and its settings

mod config;
mod orchestrator;

pub use config::{ForecastSettings, PipelineConfig, DEFAULT_MAX_PARALLEL_PAIRS};
pub use orchestrator::{Diagnostic, Pipeline, PipelineOutput, RunSummary, Stage};
