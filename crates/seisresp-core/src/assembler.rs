//! # Result Assembler
//!
//! Formats an [`EvaluatedResponse`] into the pair of numbers per frequency
//! the caller asked for: amplitude/phase or real/imaginary.
//!
//! Pure transformation. Failed frequencies pass through as failure rows.

use crate::cascade::EvaluatedResponse;
use crate::response::ChannelId;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Amplitude scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeScale {
    /// `|H|`.
    #[default]
    Linear,
    /// `20 log10 |H|`.
    Decibel,
}

/// Phase unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseUnit {
    /// Degrees.
    #[default]
    Degrees,
    /// Radians.
    Radians,
}

/// Requested output representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Magnitude and phase of `H`.
    AmplitudePhase {
        /// Linear or decibel amplitude.
        #[serde(default)]
        amplitude: AmplitudeScale,
        /// Phase unit.
        #[serde(default)]
        phase: PhaseUnit,
        /// Remove 2π jumps between consecutive successful points.
        #[serde(default)]
        unwrap: bool,
    },
    /// Real and imaginary parts of `H`.
    RealImaginary,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::AmplitudePhase {
            amplitude: AmplitudeScale::Linear,
            phase: PhaseUnit::Degrees,
            unwrap: false,
        }
    }
}

impl OutputFormat {
    /// Column names of the two values.
    #[must_use]
    pub fn columns(&self) -> (&'static str, &'static str) {
        match self {
            Self::RealImaginary => ("real", "imag"),
            Self::AmplitudePhase {
                amplitude, phase, ..
            } => (
                match amplitude {
                    AmplitudeScale::Linear => "amplitude",
                    AmplitudeScale::Decibel => "amplitude_db",
                },
                match phase {
                    PhaseUnit::Degrees => "phase_deg",
                    PhaseUnit::Radians => "phase_rad",
                },
            ),
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledRow {
    /// Hz.
    pub frequency: f64,
    /// The two requested values, absent on failure.
    pub values: Option<(f64, f64)>,
    /// Failure kind and message, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RowFailure>,
}

/// Why a row has no values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Error kind name, e.g. `OutOfRange`.
    pub kind: String,
    /// Human-readable cause including the stage.
    pub message: String,
}

/// Formatted response for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledResponse {
    /// Channel the rows belong to.
    pub channel: ChannelId,
    /// Representation of `rows`.
    pub format: OutputFormat,
    /// One row per grid frequency.
    pub rows: Vec<AssembledRow>,
    /// Cascade warnings rendered as text.
    pub warnings: Vec<String>,
}

/// Map an evaluated response to `format`.
#[must_use]
pub fn assemble(evaluated: &EvaluatedResponse, format: OutputFormat) -> AssembledResponse {
    let mut unwrapper = PhaseUnwrapper::default();
    let rows = evaluated
        .points
        .iter()
        .map(|point| match &point.outcome {
            Ok(h) => {
                let values = match format {
                    OutputFormat::RealImaginary => (h.re, h.im),
                    OutputFormat::AmplitudePhase {
                        amplitude,
                        phase,
                        unwrap,
                    } => {
                        let (magnitude, mut radians) = h.to_polar();
                        if unwrap {
                            radians = unwrapper.push(radians);
                        }
                        let amplitude = match amplitude {
                            AmplitudeScale::Linear => magnitude,
                            AmplitudeScale::Decibel => 20.0 * magnitude.log10(),
                        };
                        let phase = match phase {
                            PhaseUnit::Degrees => radians.to_degrees(),
                            PhaseUnit::Radians => radians,
                        };
                        (amplitude, phase)
                    }
                };
                AssembledRow {
                    frequency: point.frequency,
                    values: Some(values),
                    failure: None,
                }
            }
            Err(failure) => AssembledRow {
                frequency: point.frequency,
                values: None,
                failure: Some(RowFailure {
                    kind: failure.error.kind().to_string(),
                    message: failure.to_string(),
                }),
            },
        })
        .collect();

    AssembledResponse {
        channel: evaluated.channel.clone(),
        format,
        rows,
        warnings: evaluated.warnings.iter().map(ToString::to_string).collect(),
    }
}

/// Running 2π correction across a phase sequence.
#[derive(Debug, Default)]
struct PhaseUnwrapper {
    previous: Option<f64>,
    offset: f64,
}

impl PhaseUnwrapper {
    fn push(&mut self, raw: f64) -> f64 {
        if let Some(previous) = self.previous {
            let mut delta = raw + self.offset - previous;
            while delta > PI {
                self.offset -= TAU;
                delta -= TAU;
            }
            while delta < -PI {
                self.offset += TAU;
                delta += TAU;
            }
        }
        let unwrapped = raw + self.offset;
        self.previous = Some(unwrapped);
        unwrapped
    }
}

// =============================================================================
// TESTS
// =============================================================================
