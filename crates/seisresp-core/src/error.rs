//! # Error Module
//!
//! Error kinds produced while building or evaluating an instrument response.
//!
//! Stage-level kinds (`DivisionByZero`, `SingularResponse`, `OutOfRange`,
//! `MissingContext`) are scoped to one (stage, frequency) evaluation and end
//! up as per-frequency failures. Request-level kinds (`InvalidRange`,
//! `UnitConversion`) are returned before any evaluation starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, ResponseError>;

/// Errors raised by the response model and the cascade engine.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ResponseError {
    /// Complex division by a zero-magnitude value.
    #[error("division by zero")]
    DivisionByZero,

    /// A pole or denominator term vanishes at the evaluation frequency.
    #[error("singular response at {frequency} Hz")]
    SingularResponse { frequency: f64 },

    /// Frequency outside a tabulated or polynomial validity range.
    #[error("frequency {frequency} Hz outside valid range [{low}, {high}] Hz")]
    OutOfRange { frequency: f64, low: f64, high: f64 },

    /// A digital stage has no sample rate to work with.
    #[error("missing context: {0}")]
    MissingContext(String),

    /// Malformed frequency-grid configuration.
    #[error("invalid frequency range: {0}")]
    InvalidRange(String),

    /// Reported overall sensitivity disagrees with the product of stage
    /// gains. Only raised as an error when escalation is enabled.
    #[error(
        "normalization mismatch: reported {reported}, computed {computed} (relative error {relative_error:.4})"
    )]
    NormalizationMismatch {
        reported: f64,
        computed: f64,
        relative_error: f64,
    },

    /// A response must contain at least one stage.
    #[error("response has no stages")]
    EmptyResponse,

    /// A stage carries structurally invalid parameters.
    #[error("invalid stage {index}: {reason}")]
    InvalidStage { index: usize, reason: String },

    /// Requested output units cannot be derived from the response input units.
    #[error("unit conversion: {0}")]
    UnitConversion(String),
}

impl ResponseError {
    /// Short machine-friendly name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DivisionByZero => "DivisionByZero",
            Self::SingularResponse { .. } => "SingularResponse",
            Self::OutOfRange { .. } => "OutOfRange",
            Self::MissingContext(_) => "MissingContext",
            Self::InvalidRange(_) => "InvalidRange",
            Self::NormalizationMismatch { .. } => "NormalizationMismatch",
            Self::EmptyResponse => "EmptyResponse",
            Self::InvalidStage { .. } => "InvalidStage",
            Self::UnitConversion(_) => "UnitConversion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_variants() {
        assert_eq!(ResponseError::DivisionByZero.kind(), "DivisionByZero");
        assert_eq!(
            ResponseError::OutOfRange {
                frequency: 1.0,
                low: 2.0,
                high: 3.0
            }
            .kind(),
            "OutOfRange"
        );
        assert_eq!(
            ResponseError::MissingContext("rate".into()).kind(),
            "MissingContext"
        );
    }

    #[test]
    fn display_includes_range() {
        let err = ResponseError::OutOfRange {
            frequency: 50.0,
            low: 0.1,
            high: 20.0,
        };
        let text = err.to_string();
        assert!(text.contains("50"));
        assert!(text.contains("[0.1, 20]"));
    }
}
