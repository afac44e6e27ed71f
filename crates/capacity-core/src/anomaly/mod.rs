//! In-sample anomaly detection
//!
//! Flags historical values that fall outside the interval of a model fitted
//! on the whole series.

mod detector;

pub use detector::{AnomalyDetector, ANOMALY_TOLERANCE};
