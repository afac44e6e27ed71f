//! Error taxonomy for enrichment and forecasting
//!
//! Every failure the core can produce maps onto one [`ErrorKind`], which the
//! orchestrator copies into its diagnostics table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CapacityError>;

/// Errors raised by the enrichment and forecasting layers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapacityError {
    #[error("unknown site '{site_id}'")]
    UnknownSite { site_id: String },

    #[error("invalid constant '{field}' for site '{site_id}': {reason}")]
    InvalidSiteConstant {
        site_id: String,
        field: &'static str,
        reason: String,
    },

    #[error("invalid setting '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("data quality: site '{site_id}' on {reporting_date}, field '{field}': {reason}")]
    DataQuality {
        site_id: String,
        reporting_date: NaiveDate,
        field: &'static str,
        reason: String,
    },

    #[error("insufficient history: need at least {required} periods, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("forecast timestamps do not overlap the held-out actuals")]
    Alignment,

    #[error("forecast model error: {0}")]
    Model(String),
}

impl CapacityError {
    pub(crate) fn data_quality(
        site_id: &str,
        reporting_date: NaiveDate,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataQuality {
            site_id: site_id.to_string(),
            reporting_date,
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_constant(
        site_id: &str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSiteConstant {
            site_id: site_id.to_string(),
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSite { .. }
            | Self::InvalidSiteConstant { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::DataQuality { .. } => ErrorKind::DataQuality,
            Self::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            Self::Alignment => ErrorKind::Alignment,
            Self::Model(_) => ErrorKind::Model,
        }
    }
}

/// Error categories reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    DataQuality,
    InsufficientHistory,
    Alignment,
    Model,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::DataQuality => "data_quality",
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::Alignment => "alignment",
            ErrorKind::Model => "model",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            CapacityError::UnknownSite { site_id: "X".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CapacityError::data_quality("KenyaDC", date, "avg_it_load_kw", "zero").kind(),
            ErrorKind::DataQuality
        );
        assert_eq!(
            CapacityError::InsufficientHistory { required: 2, actual: 1 }.kind(),
            ErrorKind::InsufficientHistory
        );
        assert_eq!(CapacityError::Alignment.kind(), ErrorKind::Alignment);
    }

    #[test]
    fn test_data_quality_message_locates_record() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let err = CapacityError::data_quality("UgandaDC", date, "reserved_racks", "missing");
        let msg = err.to_string();
        assert!(msg.contains("UgandaDC"));
        assert!(msg.contains("2024-02-29"));
        assert!(msg.contains("reserved_racks"));
    }
}
