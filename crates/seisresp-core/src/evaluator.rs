//! # Stage Evaluator
//!
//! Transfer function of a single stage at one angular frequency.
//!
//! Every stage kind is matched exhaustively. The caller supplies the
//! running sample rate of the cascade through [`StageContext`]; digital
//! stages that end up with no rate at all fail with `MissingContext`.

use crate::complex::{Complex64, ComplexExt, ONE, ZERO};
use crate::error::{ResponseError, Result};
use crate::stage::{
    CoefficientType, Coefficients, DelayMode, PolesZeros, Stage, TransferFunctionType,
};
use std::f64::consts::TAU;

/// Per-stage context threaded through the cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageContext {
    /// Sample rate (Hz) in effect at this stage's input.
    pub sample_rate: Option<f64>,
    /// Delay selection for decimation stages.
    pub delay_mode: DelayMode,
}

impl StageContext {
    /// Context at a known rate with the nominal delay.
    #[must_use]
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            ..Self::default()
        }
    }
}

/// Evaluate `stage` at angular frequency `omega` (rad/s).
pub fn evaluate_stage(stage: &Stage, omega: f64, ctx: &StageContext) -> Result<Complex64> {
    let frequency = omega / TAU;
    match stage {
        Stage::PolesZeros(pz) => {
            let x = pz_variable(pz.transfer_function_type, omega, ctx.sample_rate)?;
            Ok(pz_shape(pz, x, frequency)?.scale(pz.normalization_factor))
        }
        Stage::Coefficients(c) => evaluate_coefficients(c, omega, ctx.sample_rate),
        Stage::ResponseList(list) => {
            let (amplitude, phase) = list.interpolate(frequency)?;
            Ok(Complex64::from_polar(amplitude, phase.to_radians()))
        }
        Stage::Polynomial(p) => p.value_at(frequency).map(Complex64::from),
        Stage::Decimation(d) => Ok(Complex64::cis(-omega * d.effective_delay(ctx.delay_mode))),
        Stage::Gain(g) => Ok(Complex64::from(g.sensitivity)),
    }
}

/// The A0 that brings `|H|` of a poles-zeros stage to 1 at `frequency` (Hz).
///
/// Digital-Z stages need `sample_rate`.
pub fn computed_normalization(
    pz: &PolesZeros,
    frequency: f64,
    sample_rate: Option<f64>,
) -> Result<f64> {
    let x = pz_variable(pz.transfer_function_type, TAU * frequency, sample_rate)?;
    let magnitude = pz_shape(pz, x, frequency)?.norm();
    if magnitude == 0.0 {
        return Err(ResponseError::DivisionByZero);
    }
    Ok(1.0 / magnitude)
}

// =============================================================================
// POLES AND ZEROS
// =============================================================================

/// The complex variable a poles-zeros product is evaluated at.
fn pz_variable(
    kind: TransferFunctionType,
    omega: f64,
    sample_rate: Option<f64>,
) -> Result<Complex64> {
    match kind {
        TransferFunctionType::Laplace => Ok(Complex64::new(0.0, omega)),
        TransferFunctionType::LaplaceHertz => Ok(Complex64::new(0.0, omega / TAU)),
        TransferFunctionType::DigitalZ => {
            let rate = require_rate(sample_rate, "digital poles-zeros stage")?;
            Ok(Complex64::cis(omega / rate))
        }
    }
}

/// `Π(x - zero) / Π(x - pole)`, without the A0 factor.
fn pz_shape(pz: &PolesZeros, x: Complex64, frequency: f64) -> Result<Complex64> {
    let numerator = pz
        .zeros
        .iter()
        .fold(ONE, |acc, zero| acc * (x - *zero));

    let mut denominator = ONE;
    for pole in &pz.poles {
        let factor = x - *pole;
        if factor.norm_sqr() == 0.0 {
            return Err(ResponseError::SingularResponse { frequency });
        }
        denominator = denominator * factor;
    }

    numerator
        .checked_div(denominator)
        .map_err(|_| ResponseError::SingularResponse { frequency })
}

// =============================================================================
// COEFFICIENTS
// =============================================================================

fn evaluate_coefficients(c: &Coefficients, omega: f64, running_rate: Option<f64>) -> Result<Complex64> {
    let frequency = omega / TAU;
    // Digital: polynomials in z^-1. Analog: ascending powers of s.
    let x = match c.transfer_function_type {
        CoefficientType::Digital => {
            let rate = require_rate(c.input_sample_rate.or(running_rate), "coefficient stage")?;
            Complex64::cis(-omega / rate)
        }
        CoefficientType::AnalogRadians => Complex64::new(0.0, omega),
        CoefficientType::AnalogHertz => Complex64::new(0.0, frequency),
    };

    let numerator = horner(&c.numerator, x);
    if c.denominator.is_empty() {
        return Ok(numerator);
    }
    let denominator = horner(&c.denominator, x);
    numerator
        .checked_div(denominator)
        .map_err(|_| ResponseError::SingularResponse { frequency })
}

/// `Σ c_k x^k`.
fn horner(coefficients: &[f64], x: Complex64) -> Complex64 {
    coefficients
        .iter()
        .rev()
        .fold(ZERO, |acc, c| acc * x + Complex64::from(*c))
}

fn require_rate(rate: Option<f64>, what: &str) -> Result<f64> {
    rate.ok_or_else(|| ResponseError::MissingContext(format!("{what} has no sample rate")))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stage::{Decimation, Polynomial, ResponseList, ResponseListEntry};
    use std::f64::consts::{FRAC_1_SQRT_2, PI, SQRT_2};

    fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
        (a.re - b.re).abs() < tol && (a.im - b.im).abs() < tol
    }

    #[test]
    fn empty_poles_zeros_is_the_normalization_factor() {
        let stage = Stage::PolesZeros(PolesZeros::new(vec![], vec![], 2.5));
        for omega in [0.0, 1.0, 100.0, 1e4] {
            let h = evaluate_stage(&stage, omega, &StageContext::default()).unwrap();
            assert_eq!(h, Complex64::from(2.5));
        }
    }

    #[test]
    fn single_real_pole() {
        // 1 / (j + 1) at omega = 1
        let stage = Stage::PolesZeros(PolesZeros::new(vec![Complex64::from(-1.0)], vec![], 1.0));
        let h = evaluate_stage(&stage, 1.0, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::new(0.5, -0.5), 1e-12));
    }

    #[test]
    fn zero_at_origin_differentiates() {
        let stage = Stage::PolesZeros(PolesZeros::new(vec![], vec![ZERO], 1.0));
        let h = evaluate_stage(&stage, 3.0, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::new(0.0, 3.0), 1e-12));
    }

    #[test]
    fn hertz_poles_use_frequency_not_omega() {
        let pz = PolesZeros::new(vec![Complex64::from(-1.0)], vec![], 1.0)
            .with_type(TransferFunctionType::LaplaceHertz);
        // f = 1 Hz -> s = j
        let h = evaluate_stage(&Stage::PolesZeros(pz), TAU, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::new(0.5, -0.5), 1e-12));
    }

    #[test]
    fn pole_on_axis_is_singular() {
        let stage = Stage::PolesZeros(PolesZeros::new(vec![ZERO], vec![], 1.0));
        let err = evaluate_stage(&stage, 0.0, &StageContext::default()).unwrap_err();
        assert!(matches!(err, ResponseError::SingularResponse { .. }));
    }

    #[test]
    fn digital_poles_zeros_needs_rate() {
        let pz = PolesZeros::new(vec![], vec![Complex64::from(-1.0)], 0.5)
            .with_type(TransferFunctionType::DigitalZ);
        let stage = Stage::PolesZeros(pz);
        let err = evaluate_stage(&stage, 1.0, &StageContext::default()).unwrap_err();
        assert!(matches!(err, ResponseError::MissingContext(_)));

        // z = 1 at DC: 0.5 * (1 + 1) = 1
        let h = evaluate_stage(&stage, 0.0, &StageContext::with_sample_rate(100.0)).unwrap();
        assert!(close(h, ONE, 1e-12));
    }

    #[test]
    fn fir_moving_average() {
        let stage = Stage::Coefficients(Coefficients::fir(vec![0.5, 0.5], 100.0));
        let ctx = StageContext::default();

        let dc = evaluate_stage(&stage, 0.0, &ctx).unwrap();
        assert!(close(dc, ONE, 1e-12));

        // Nyquist: omega / fs = pi
        let nyquist = evaluate_stage(&stage, PI * 100.0, &ctx).unwrap();
        assert!(nyquist.norm() < 1e-12);
    }

    #[test]
    fn coefficients_fall_back_to_running_rate() {
        let stage = Stage::digital();
        let err = evaluate_stage(&stage, 1.0, &StageContext::default()).unwrap_err();
        assert!(matches!(err, ResponseError::MissingContext(_)));
        let h = evaluate_stage(&stage, 1.0, &StageContext::with_sample_rate(40.0)).unwrap();
        assert_eq!(h, ONE);
    }

    #[test]
    fn iir_single_pole() {
        // H(z) = 1 / (1 - 0.5 z^-1), at DC = 2
        let stage = Stage::Coefficients(Coefficients::iir(vec![1.0], vec![1.0, -0.5], 10.0));
        let h = evaluate_stage(&stage, 0.0, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::from(2.0), 1e-12));
    }

    #[test]
    fn iir_zero_denominator_is_singular() {
        let stage = Stage::Coefficients(Coefficients::iir(vec![1.0], vec![1.0, -1.0], 10.0));
        let err = evaluate_stage(&stage, 0.0, &StageContext::default()).unwrap_err();
        assert!(matches!(err, ResponseError::SingularResponse { .. }));
    }

    #[test]
    fn analog_coefficients_ascending_powers() {
        let c = Coefficients {
            numerator: vec![0.0, 1.0],
            denominator: vec![1.0],
            input_sample_rate: None,
            transfer_function_type: CoefficientType::AnalogRadians,
        };
        let h = evaluate_stage(&Stage::Coefficients(c), 2.0, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::new(0.0, 2.0), 1e-12));
    }

    #[test]
    fn response_list_degrees_to_complex() {
        let list = ResponseList::new(vec![
            ResponseListEntry::new(1.0, 2.0, 90.0),
            ResponseListEntry::new(2.0, 2.0, 90.0),
        ]);
        let h = evaluate_stage(&Stage::ResponseList(list), TAU, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::new(0.0, 2.0), 1e-12));
    }

    #[test]
    fn polynomial_is_zero_phase() {
        let p = Polynomial::new(vec![1.0, 1.0], 0.0, 10.0);
        let h = evaluate_stage(&Stage::Polynomial(p), TAU * 3.0, &StageContext::default()).unwrap();
        assert!(close(h, Complex64::from(4.0), 1e-12));
    }

    #[test]
    fn decimation_is_pure_delay() {
        let stage = Stage::Decimation(Decimation::new(100.0, 2).with_delay(0.01, 0.0));
        let omega = TAU * 5.0;
        let h = evaluate_stage(&stage, omega, &StageContext::default()).unwrap();
        assert!((h.norm() - 1.0).abs() < 1e-12);
        assert!((h.arg() + omega * 0.01).abs() < 1e-12);
    }

    #[test]
    fn decimation_respects_delay_mode() {
        let stage = Stage::Decimation(Decimation::new(100.0, 2).with_delay(0.01, 0.01));
        let ctx = StageContext {
            sample_rate: None,
            delay_mode: DelayMode::Residual,
        };
        let h = evaluate_stage(&stage, 10.0, &ctx).unwrap();
        assert!(close(h, ONE, 1e-12));
    }

    #[test]
    fn computed_normalization_restores_unit_gain() {
        let pz = PolesZeros::new(vec![Complex64::from(-1.0)], vec![], 1.0);
        let a0 = computed_normalization(&pz, 1.0 / TAU, None).unwrap();
        assert!((a0 - SQRT_2).abs() < 1e-12);

        let normalized = PolesZeros {
            normalization_factor: a0,
            ..pz
        };
        let h = evaluate_stage(&Stage::PolesZeros(normalized), 1.0, &StageContext::default()).unwrap();
        assert!((h.norm() - 1.0).abs() < 1e-12);
        assert!((h.re - FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn computed_normalization_of_zero_magnitude_fails() {
        let pz = PolesZeros::new(vec![], vec![ZERO], 1.0);
        assert_eq!(
            computed_normalization(&pz, 0.0, None),
            Err(ResponseError::DivisionByZero)
        );
    }
}
