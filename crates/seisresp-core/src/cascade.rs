//! # Response Cascade
//!
//! Composes the ordered stages of a [`Response`] into one end-to-end
//! transfer function over a [`FrequencyGrid`].
//!
//! ## Evaluation
//!
//! For each frequency the accumulator starts at `1 + 0j` and is multiplied
//! by every stage's contribution in declared order. The global
//! normalization factor and the optional `(jω)^n` output-unit transform are
//! applied last.
//!
//! ## Sample-rate context
//!
//! The rate each digital stage sees is planned once per response as a fold
//! over the stage list: a decimation stage runs at its declared input rate
//! and hands `rate / factor` downstream; a digital coefficient stage with a
//! declared rate resets the running rate. The plan does not depend on the
//! frequency.
//!
//! ## Failures
//!
//! A stage failure at one frequency is recorded on that frequency only.
//! Grid errors (`InvalidRange`) and unit-conversion errors are request-level
//! and returned before anything is evaluated.

use crate::complex::{Complex64, ComplexExt, ONE};
use crate::error::{ResponseError, Result};
use crate::evaluator::{StageContext, computed_normalization, evaluate_stage};
use crate::grid::FrequencyGrid;
use crate::response::{ChannelId, Response};
use crate::stage::{CoefficientType, DelayMode, Stage};
use crate::units::{GroundMotion, UnitConversion, UnitTable, derivative_order};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

/// Default relative tolerance between reported and computed sensitivity.
pub const DEFAULT_SENSITIVITY_TOLERANCE: f64 = 0.05;

/// Relative difference under which two sample rates are the same.
const RATE_TOLERANCE: f64 = 1e-6;

// =============================================================================
// OPTIONS
// =============================================================================

/// How the overall scale of the cascade is fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Stage gains define the scale; the reported sensitivity is only
    /// cross-checked.
    #[default]
    StageGains,
    /// Rescale so the reported overall sensitivity replaces the product of
    /// stage gains.
    ReportedSensitivity,
}

/// Knobs for one cascade evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeOptions {
    /// Relative tolerance for the sensitivity cross-checks.
    pub sensitivity_tolerance: f64,
    /// Turn a sensitivity mismatch into a failure at every frequency.
    pub escalate_mismatch: bool,
    /// Where the overall scale comes from.
    pub normalization: NormalizationMode,
    /// Which decimation delay enters the phase.
    pub delay_mode: DelayMode,
    /// Re-express the response against this ground motion (SI units).
    pub target_units: Option<GroundMotion>,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            sensitivity_tolerance: DEFAULT_SENSITIVITY_TOLERANCE,
            escalate_mismatch: false,
            normalization: NormalizationMode::StageGains,
            delay_mode: DelayMode::Nominal,
            target_units: None,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Non-fatal findings about a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeWarning {
    /// Reported overall sensitivity vs product of stage gains.
    NormalizationMismatch {
        /// Sensitivity stated on the response.
        reported: f64,
        /// Product of the stage gains.
        computed: f64,
        /// `|reported - computed| / |reported|`.
        relative_error: f64,
    },
    /// Stated A0 of a poles-zeros stage vs the A0 implied by its
    /// normalization frequency.
    NormalizationFactorMismatch {
        /// Offending poles-zeros stage.
        stage_index: usize,
        /// A0 carried by the stage.
        stated: f64,
        /// A0 for unit gain at the normalization frequency.
        computed: f64,
    },
    /// A stage declares a sample rate the upstream chain does not deliver.
    SampleRateMismatch {
        /// Stage declaring the rate.
        stage_index: usize,
        /// Rate on the stage, Hz.
        declared: f64,
        /// Rate arriving from upstream, Hz.
        running: f64,
    },
}

impl fmt::Display for CascadeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NormalizationMismatch {
                reported,
                computed,
                relative_error,
            } => write!(
                f,
                "reported sensitivity {reported:e} differs from stage gain product {computed:e} ({:.2}%)",
                relative_error * 100.0
            ),
            Self::NormalizationFactorMismatch {
                stage_index,
                stated,
                computed,
            } => write!(
                f,
                "stage {stage_index}: normalization factor {stated:e} differs from computed {computed:e}"
            ),
            Self::SampleRateMismatch {
                stage_index,
                declared,
                running,
            } => write!(
                f,
                "stage {stage_index}: declared sample rate {declared} Hz but upstream delivers {running} Hz"
            ),
        }
    }
}

/// Why a single frequency could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Failing stage, `None` for failures after the stage loop.
    pub stage_index: Option<usize>,
    /// What went wrong.
    pub error: ResponseError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage_index {
            Some(index) => write!(f, "stage {index}: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Total response at one frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedPoint {
    /// Hz.
    pub frequency: f64,
    /// Complex response, or the failure that stopped it.
    pub outcome: std::result::Result<Complex64, StageFailure>,
}

impl EvaluatedPoint {
    /// The response value when evaluation succeeded.
    #[must_use]
    pub fn value(&self) -> Option<Complex64> {
        self.outcome.as_ref().ok().copied()
    }
}

/// Total response over a grid, one point per requested frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedResponse {
    /// Channel the response belongs to.
    pub channel: ChannelId,
    /// One entry per grid frequency, in grid order.
    pub points: Vec<EvaluatedPoint>,
    /// Findings from preparing the cascade.
    pub warnings: Vec<CascadeWarning>,
}

impl EvaluatedResponse {
    /// Number of frequencies that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.points.iter().filter(|p| p.outcome.is_err()).count()
    }
}

// =============================================================================
// CASCADE
// =============================================================================

/// A response prepared for evaluation: sample-rate plan, normalization and
/// unit conversion resolved up front.
#[derive(Debug, Clone)]
pub struct Cascade<'a> {
    response: &'a Response,
    contexts: Vec<StageContext>,
    normalization: f64,
    conversion: UnitConversion,
    warnings: Vec<CascadeWarning>,
    global_failure: Option<ResponseError>,
}

impl<'a> Cascade<'a> {
    /// Prepare `response`. Fails only on request-level problems: a
    /// negative or NaN tolerance, or units that cannot be converted.
    pub fn new(response: &'a Response, options: &CascadeOptions, units: &UnitTable) -> Result<Self> {
        let tolerance = options.sensitivity_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(ResponseError::InvalidRange(format!(
                "sensitivity tolerance must be non-negative, got {tolerance}"
            )));
        }

        let conversion = match options.target_units {
            Some(target) => derivative_order(units, response.input_units(), target)?,
            None => UnitConversion::IDENTITY,
        };

        let mut warnings = Vec::new();
        let contexts = plan_contexts(response, options.delay_mode, &mut warnings);
        check_stage_normalization(response, &contexts, options.sensitivity_tolerance, &mut warnings);

        let mut global_failure = None;
        let gain_product = response.gain_product();
        let mut normalization = 1.0;

        if let Some(sensitivity) = response.sensitivity() {
            let relative_error = relative_difference(sensitivity.value, gain_product);
            if relative_error > options.sensitivity_tolerance {
                warnings.push(CascadeWarning::NormalizationMismatch {
                    reported: sensitivity.value,
                    computed: gain_product,
                    relative_error,
                });
                if options.escalate_mismatch {
                    global_failure = Some(ResponseError::NormalizationMismatch {
                        reported: sensitivity.value,
                        computed: gain_product,
                        relative_error,
                    });
                }
            }

            if options.normalization == NormalizationMode::ReportedSensitivity {
                match Complex64::from(sensitivity.value).checked_div(Complex64::from(gain_product)) {
                    Ok(factor) => normalization = factor.re,
                    Err(err) => {
                        global_failure.get_or_insert(err);
                    }
                }
            }
        }

        Ok(Self {
            response,
            contexts,
            normalization,
            conversion,
            warnings,
            global_failure,
        })
    }

    /// The response being evaluated.
    #[must_use]
    pub fn response(&self) -> &Response {
        self.response
    }

    /// Sample-rate context of each stage, in stage order.
    #[must_use]
    pub fn contexts(&self) -> &[StageContext] {
        &self.contexts
    }

    /// Findings from preparation, in discovery order.
    #[must_use]
    pub fn warnings(&self) -> &[CascadeWarning] {
        &self.warnings
    }

    /// Global factor applied after the stage loop.
    #[must_use]
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    /// Output-unit transform applied last.
    #[must_use]
    pub fn conversion(&self) -> UnitConversion {
        self.conversion
    }

    /// Total response at one frequency (Hz).
    pub fn evaluate_at(&self, frequency: f64) -> std::result::Result<Complex64, StageFailure> {
        if let Some(error) = &self.global_failure {
            return Err(StageFailure {
                stage_index: None,
                error: error.clone(),
            });
        }

        let omega = TAU * frequency;
        let mut total = ONE;
        for (index, (stage, ctx)) in self.response.stages().iter().zip(&self.contexts).enumerate() {
            let contribution = evaluate_stage(stage, omega, ctx).map_err(|error| StageFailure {
                stage_index: Some(index),
                error,
            })?;
            total = total * contribution;
        }
        total = total.scale(self.normalization);

        if self.conversion.order != 0 {
            let derivative = Complex64::new(0.0, omega)
                .checked_powi(self.conversion.order)
                .map_err(|error| StageFailure {
                    stage_index: None,
                    error,
                })?;
            total = total * derivative;
        }
        Ok(total.scale(self.conversion.scale))
    }

    /// Evaluate over a grid. The grid is validated before any evaluation.
    pub fn evaluate(&self, grid: &FrequencyGrid) -> Result<EvaluatedResponse> {
        grid.validate()?;
        let points = grid
            .iter()
            .map(|frequency| EvaluatedPoint {
                frequency,
                outcome: self.evaluate_at(frequency),
            })
            .collect();
        Ok(EvaluatedResponse {
            channel: self.response.channel().clone(),
            points,
            warnings: self.warnings.clone(),
        })
    }
}

/// Prepare and evaluate one response.
pub fn evaluate_response(
    response: &Response,
    grid: &FrequencyGrid,
    options: &CascadeOptions,
    units: &UnitTable,
) -> Result<EvaluatedResponse> {
    grid.validate()?;
    Cascade::new(response, options, units)?.evaluate(grid)
}

/// Evaluate independent responses against the same grid.
///
/// A bad grid fails the whole batch; a unit-conversion problem fails only
/// the response it belongs to.
pub fn evaluate_batch(
    responses: &[Response],
    grid: &FrequencyGrid,
    options: &CascadeOptions,
    units: &UnitTable,
) -> Result<Vec<Result<EvaluatedResponse>>> {
    grid.validate()?;
    let run = |response: &Response| -> Result<EvaluatedResponse> {
        Cascade::new(response, options, units)?.evaluate(grid)
    };

    #[cfg(feature = "parallel")]
    let results = {
        use rayon::prelude::*;
        responses.par_iter().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results = responses.iter().map(run).collect();

    Ok(results)
}

// =============================================================================
// PLANNING HELPERS
// =============================================================================

/// Fold the stage list into the sample rate each stage sees.
fn plan_contexts(
    response: &Response,
    delay_mode: DelayMode,
    warnings: &mut Vec<CascadeWarning>,
) -> Vec<StageContext> {
    let mut running = response.sample_rate();
    let mut contexts = Vec::with_capacity(response.stages().len());

    for (stage_index, stage) in response.stages().iter().enumerate() {
        let declared = match stage {
            Stage::Decimation(d) => Some(d.input_sample_rate),
            Stage::Coefficients(c) if c.transfer_function_type == CoefficientType::Digital => {
                c.input_sample_rate
            }
            _ => None,
        };
        if let (Some(declared), Some(upstream)) = (declared, running) {
            if relative_difference(declared, upstream) > RATE_TOLERANCE {
                warnings.push(CascadeWarning::SampleRateMismatch {
                    stage_index,
                    declared,
                    running: upstream,
                });
            }
        }

        let input_rate = declared.or(running);
        contexts.push(StageContext {
            sample_rate: input_rate,
            delay_mode,
        });
        running = match stage {
            Stage::Decimation(d) => input_rate.map(|rate| rate / f64::from(d.decimation_factor)),
            _ => input_rate,
        };
    }
    contexts
}

/// Compare stated A0 against the one implied by the normalization frequency.
fn check_stage_normalization(
    response: &Response,
    contexts: &[StageContext],
    tolerance: f64,
    warnings: &mut Vec<CascadeWarning>,
) {
    for (stage_index, (stage, ctx)) in response.stages().iter().zip(contexts).enumerate() {
        let Stage::PolesZeros(pz) = stage else {
            continue;
        };
        let Some(frequency) = pz.normalization_frequency else {
            continue;
        };
        // Stages whose shape cannot be evaluated there are reported at
        // evaluation time instead.
        let Ok(computed) = computed_normalization(pz, frequency, ctx.sample_rate) else {
            continue;
        };
        if relative_difference(pz.normalization_factor, computed) > tolerance {
            warnings.push(CascadeWarning::NormalizationFactorMismatch {
                stage_index,
                stated: pz.normalization_factor,
                computed,
            });
        }
    }
}

/// `|reference - value| / |reference|`, infinite when only the reference is zero.
fn relative_difference(reference: f64, value: f64) -> f64 {
    let diff = (reference - value).abs();
    if diff == 0.0 {
        0.0
    } else if reference == 0.0 {
        f64::INFINITY
    } else {
        diff / reference.abs()
    }
}

// =============================================================================
// TESTS
// =============================================================================
