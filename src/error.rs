//! Error types for the spatial-eval library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for spatial-eval operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types that can occur during spatial evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Malformed or unusable geometry: bad dimensions, non-finite
    /// coordinates, unrepairable shapes, kind/mode mismatches.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Invalid evaluation configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A prediction is missing the confidence required for sorting or sweeps.
    #[error("Missing confidence: {0}")]
    MissingConfidence(String),

    /// A label was requested that is not present in the evaluated set.
    #[error("Class not found: {0}")]
    ClassNotFound(String),
}

/// How geometry failures encountered mid-evaluation are handled.
///
/// Configuration errors always fail the call; this level only governs
/// per-object and per-pair geometry problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorLevel {
    /// Propagate the error and abort the evaluation call.
    Fail,
    /// Log a warning and score the offending object or pair as zero overlap.
    #[default]
    WarnAndZero,
    /// Silently score the offending object or pair as zero overlap.
    SilentZero,
}

impl ErrorLevel {
    /// Builds an error level from its numeric code (0 = fail, 1 = warn,
    /// 2 = silent).
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` for codes outside `0..=2`.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ErrorLevel::Fail),
            1 => Ok(ErrorLevel::WarnAndZero),
            2 => Ok(ErrorLevel::SilentZero),
            _ => Err(EvalError::Configuration(format!(
                "error level must be 0 (fail), 1 (warn) or 2 (silent), got {code}"
            ))),
        }
    }
}
