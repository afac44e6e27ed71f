//! Configuration loading for the CLI
//!
//! One TOML file holds the site registry, the forecast settings and the
//! alert thresholds. Environment variables prefixed `DCAP__` override any
//! key, e.g. `DCAP__FORECAST__MAX_PARALLEL_PAIRS=8`.

use anyhow::{bail, Context, Result};
use capacity_core::enrichment::AlertThresholds;
use capacity_core::pipeline::{ForecastSettings, PipelineConfig};
use capacity_core::{SiteConstants, SiteRegistry};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One `[[sites]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    pub id: String,
    #[serde(flatten)]
    pub constants: SiteConstants,
}

/// Full configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sites: Vec<SiteEntry>,

    #[serde(default)]
    pub forecast: ForecastSettings,

    #[serde(default)]
    pub alerts: AlertThresholds,

    /// File the configuration was read from
    #[serde(skip)]
    pub source: PathBuf,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.exists() {
            bail!(
                "configuration file {} not found (pass --config or create it)",
                path.display()
            );
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_path()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("DCAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut app: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        app.source = path;

        if app.sites.is_empty() {
            bail!("no sites configured in {}", app.source.display());
        }
        let mut seen = HashSet::new();
        for site in &app.sites {
            if !seen.insert(site.id.as_str()) {
                bail!("site '{}' is configured more than once", site.id);
            }
        }

        info!(
            path = %app.source.display(),
            sites = app.sites.len(),
            metrics = app.forecast.metrics.len(),
            horizons = app.forecast.horizons.len(),
            "Configuration loaded"
        );
        Ok(app)
    }

    /// Validated site registry
    pub fn registry(&self) -> Result<Arc<SiteRegistry>> {
        let registry = SiteRegistry::new(
            self.sites
                .iter()
                .map(|s| (s.id.clone(), s.constants.clone())),
        )
        .context("Invalid site constants")?;
        Ok(Arc::new(registry))
    }

    /// Validated pipeline settings
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            forecast: self.forecast.clone(),
            alerts: self.alerts.clone(),
        };
        config.validate().context("Invalid pipeline settings")?;
        Ok(config)
    }
}

/// `<config dir>/dcap/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs_next::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("dcap").join("config.toml"))
}
