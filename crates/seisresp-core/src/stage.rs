//! # Stage Module
//!
//! The closed set of filter stages an instrument response is built from.
//!
//! Each variant carries only the parameters its transfer function needs.
//! Evaluation lives in [`crate::evaluator`]; this module is data plus
//! structural validation.

use crate::complex::Complex64;
use crate::error::{ResponseError, Result};
use serde::{Deserialize, Serialize};

fn default_one() -> f64 {
    1.0
}

fn default_factor() -> u32 {
    1
}

// =============================================================================
// POLES AND ZEROS
// =============================================================================

/// Domain in which poles and zeros are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFunctionType {
    /// Laplace transform, rad/s: s = jω.
    #[default]
    Laplace,
    /// Laplace transform, Hz: s = j·f.
    LaplaceHertz,
    /// Z transform on the unit circle: z = e^{jω/fs}.
    DigitalZ,
}

/// Poles/zeros filter: `A0 · Π(x - zero) / Π(x - pole)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolesZeros {
    /// Poles in the domain of `transfer_function_type`.
    #[serde(default)]
    pub poles: Vec<Complex64>,
    /// Zeros in the same domain.
    #[serde(default)]
    pub zeros: Vec<Complex64>,
    /// The A0 scale factor.
    #[serde(default = "default_one")]
    pub normalization_factor: f64,
    /// Domain the poles and zeros are expressed in.
    #[serde(default)]
    pub transfer_function_type: TransferFunctionType,
    /// Frequency (Hz) at which A0 normalizes the shape to unit magnitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization_frequency: Option<f64>,
}

impl PolesZeros {
    /// Laplace (rad/s) poles-zeros stage.
    #[must_use]
    pub fn new(poles: Vec<Complex64>, zeros: Vec<Complex64>, normalization_factor: f64) -> Self {
        Self {
            poles,
            zeros,
            normalization_factor,
            transfer_function_type: TransferFunctionType::Laplace,
            normalization_frequency: None,
        }
    }

    /// Same stage expressed in another domain.
    #[must_use]
    pub fn with_type(mut self, transfer_function_type: TransferFunctionType) -> Self {
        self.transfer_function_type = transfer_function_type;
        self
    }

    /// Record the frequency A0 was computed at.
    #[must_use]
    pub fn with_normalization_frequency(mut self, frequency: f64) -> Self {
        self.normalization_frequency = Some(frequency);
        self
    }
}

// =============================================================================
// COEFFICIENTS
// =============================================================================

/// Domain of a coefficient filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientType {
    /// `Σ n_k z^-k / Σ d_k z^-k`.
    #[default]
    Digital,
    /// Ascending powers of s = jω.
    AnalogRadians,
    /// Ascending powers of s = j·f.
    AnalogHertz,
}

/// Symmetry of a tabulated FIR half-filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirSymmetry {
    /// Coefficients are given in full.
    #[default]
    None,
    /// Odd number of taps; the last given coefficient is the centre tap.
    Odd,
    /// Even number of taps; the given half is mirrored entirely.
    Even,
}

impl FirSymmetry {
    /// Expand a half filter to the full tap list.
    #[must_use]
    pub fn expand(self, half: &[f64]) -> Vec<f64> {
        let mirrored: &[f64] = match self {
            Self::None => return half.to_vec(),
            Self::Odd => &half[..half.len().saturating_sub(1)],
            Self::Even => half,
        };
        let mut full = Vec::with_capacity(half.len() + mirrored.len());
        full.extend_from_slice(half);
        full.extend(mirrored.iter().rev());
        full
    }
}

/// FIR/IIR filter given by polynomial coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// Numerator coefficients, lowest order first.
    #[serde(default)]
    pub numerator: Vec<f64>,
    /// Empty means a pure FIR filter.
    #[serde(default)]
    pub denominator: Vec<f64>,
    /// Declared rate the coefficients are normalized to. Falls back to the
    /// running rate of the cascade when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_sample_rate: Option<f64>,
    /// Digital or analog interpretation of the coefficients.
    #[serde(default)]
    pub transfer_function_type: CoefficientType,
}

impl Coefficients {
    /// Digital IIR filter.
    #[must_use]
    pub fn iir(numerator: Vec<f64>, denominator: Vec<f64>, input_sample_rate: f64) -> Self {
        Self {
            numerator,
            denominator,
            input_sample_rate: Some(input_sample_rate),
            transfer_function_type: CoefficientType::Digital,
        }
    }

    /// Digital FIR filter.
    #[must_use]
    pub fn fir(numerator: Vec<f64>, input_sample_rate: f64) -> Self {
        Self::iir(numerator, Vec::new(), input_sample_rate)
    }

    /// FIR filter from a (possibly symmetric) half-coefficient list, each
    /// tap divided by `divisor`.
    #[must_use]
    pub fn fir_symmetric(
        symmetry: FirSymmetry,
        half: &[f64],
        divisor: f64,
        input_sample_rate: f64,
    ) -> Self {
        let taps = symmetry
            .expand(half)
            .into_iter()
            .map(|c| c / divisor)
            .collect();
        Self::fir(taps, input_sample_rate)
    }

    /// True when the denominator is empty or the constant 1.
    #[must_use]
    pub fn is_fir(&self) -> bool {
        self.denominator.is_empty() || self.denominator == [1.0]
    }
}

// =============================================================================
// RESPONSE LIST
// =============================================================================

/// One tabulated point of a response list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseListEntry {
    /// Hz.
    pub frequency: f64,
    /// Linear amplitude.
    pub amplitude: f64,
    /// Degrees.
    pub phase: f64,
}

impl ResponseListEntry {
    /// Entry at `frequency` (Hz) with `phase` in degrees.
    #[must_use]
    pub fn new(frequency: f64, amplitude: f64, phase: f64) -> Self {
        Self {
            frequency,
            amplitude,
            phase,
        }
    }
}

/// Tabulated amplitude/phase response, ordered by frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseList {
    /// Tabulated points, strictly increasing in frequency.
    pub entries: Vec<ResponseListEntry>,
}

impl ResponseList {
    /// Wrap an already ordered table.
    #[must_use]
    pub fn new(entries: Vec<ResponseListEntry>) -> Self {
        Self { entries }
    }

    /// First and last tabulated frequency.
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.entries.first()?.frequency, self.entries.last()?.frequency))
    }

    /// Amplitude and phase (degrees) at `frequency`, linearly interpolated
    /// between the bracketing entries. Phase is not unwrapped.
    pub fn interpolate(&self, frequency: f64) -> Result<(f64, f64)> {
        let (low, high) = self.bounds().ok_or(ResponseError::OutOfRange {
            frequency,
            low: f64::NAN,
            high: f64::NAN,
        })?;
        if !(low..=high).contains(&frequency) {
            return Err(ResponseError::OutOfRange {
                frequency,
                low,
                high,
            });
        }

        // First entry whose frequency is >= the requested one.
        let upper = self.entries.partition_point(|e| e.frequency < frequency);
        let hi = self.entries[upper];
        if hi.frequency == frequency || upper == 0 {
            return Ok((hi.amplitude, hi.phase));
        }
        let lo = self.entries[upper - 1];
        let t = (frequency - lo.frequency) / (hi.frequency - lo.frequency);
        Ok((
            lo.amplitude + t * (hi.amplitude - lo.amplitude),
            lo.phase + t * (hi.phase - lo.phase),
        ))
    }
}

// =============================================================================
// POLYNOMIAL
// =============================================================================

/// Real polynomial in frequency (Hz), ascending powers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    /// Coefficients, constant term first.
    pub coefficients: Vec<f64>,
    /// Inclusive `(low, high)` in Hz.
    pub valid_frequency_range: (f64, f64),
}

impl Polynomial {
    /// Polynomial valid on `[low, high]` Hz.
    #[must_use]
    pub fn new(coefficients: Vec<f64>, low: f64, high: f64) -> Self {
        Self {
            coefficients,
            valid_frequency_range: (low, high),
        }
    }

    /// Value of the polynomial at `frequency`.
    pub fn value_at(&self, frequency: f64) -> Result<f64> {
        let (low, high) = self.valid_frequency_range;
        if !(low..=high).contains(&frequency) {
            return Err(ResponseError::OutOfRange {
                frequency,
                low,
                high,
            });
        }
        Ok(self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * frequency + c))
    }
}

// =============================================================================
// DECIMATION
// =============================================================================

/// Which delay a decimation stage applies as its phase term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayMode {
    /// The estimated delay.
    #[default]
    Nominal,
    /// Delay minus the correction already applied by the digitizer.
    Residual,
    /// No phase term at all.
    Ignore,
}

/// Downsampling stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decimation {
    /// Hz.
    pub input_sample_rate: f64,
    /// Keep one sample out of this many.
    #[serde(default = "default_factor")]
    pub decimation_factor: u32,
    /// Index of the first input sample kept. Carries no delay.
    #[serde(default)]
    pub offset: u32,
    /// Estimated delay of the stage, seconds.
    #[serde(default)]
    pub delay: f64,
    /// Delay already corrected upstream, seconds.
    #[serde(default)]
    pub correction_applied: f64,
}

impl Decimation {
    /// Decimation with zero offset and no delay.
    #[must_use]
    pub fn new(input_sample_rate: f64, decimation_factor: u32) -> Self {
        Self {
            input_sample_rate,
            decimation_factor,
            offset: 0,
            delay: 0.0,
            correction_applied: 0.0,
        }
    }

    /// Start decimating at sample `offset`. The delay is left untouched.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Delay stated in samples at the input rate, as FIR filters declare it.
    #[must_use]
    pub fn with_delay_samples(mut self, delay_samples: f64) -> Self {
        self.delay = delay_samples / self.input_sample_rate;
        self
    }

    /// Set the estimated delay and the correction applied, both in seconds.
    #[must_use]
    pub fn with_delay(mut self, delay: f64, correction_applied: f64) -> Self {
        self.delay = delay;
        self.correction_applied = correction_applied;
        self
    }

    /// Rate after decimation.
    #[must_use]
    pub fn output_sample_rate(&self) -> f64 {
        self.input_sample_rate / f64::from(self.decimation_factor)
    }

    /// Delay the phase term uses under `mode`.
    #[must_use]
    pub fn effective_delay(&self, mode: DelayMode) -> f64 {
        match mode {
            DelayMode::Nominal => self.delay,
            DelayMode::Residual => self.delay - self.correction_applied,
            DelayMode::Ignore => 0.0,
        }
    }
}

// =============================================================================
// GAIN
// =============================================================================

/// Frequency-independent scalar gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gain {
    /// Output units per input unit.
    pub sensitivity: f64,
    /// Reference frequency (Hz); informational only.
    #[serde(default)]
    pub frequency_of_sensitivity: f64,
}

impl Gain {
    /// Gain of `sensitivity` stated at `frequency_of_sensitivity` Hz.
    #[must_use]
    pub fn new(sensitivity: f64, frequency_of_sensitivity: f64) -> Self {
        Self {
            sensitivity,
            frequency_of_sensitivity,
        }
    }
}

// =============================================================================
// STAGE
// =============================================================================

/// One element of the signal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// Analog or digital poles and zeros.
    PolesZeros(PolesZeros),
    /// FIR or IIR coefficient filter.
    Coefficients(Coefficients),
    /// Tabulated amplitude and phase.
    ResponseList(ResponseList),
    /// Polynomial sensor.
    Polynomial(Polynomial),
    /// Downsampler.
    Decimation(Decimation),
    /// Scalar gain.
    Gain(Gain),
}

impl Stage {
    /// Flat analog stage: no poles, no zeros, unit factor.
    #[must_use]
    pub fn analog() -> Self {
        Self::PolesZeros(PolesZeros::new(Vec::new(), Vec::new(), 1.0))
    }

    /// Flat digital stage running at the cascade's current rate.
    #[must_use]
    pub fn digital() -> Self {
        Self::Coefficients(Coefficients {
            numerator: vec![1.0],
            denominator: Vec::new(),
            input_sample_rate: None,
            transfer_function_type: CoefficientType::Digital,
        })
    }

    /// Analog-to-digital conversion: a flat digital filter at `sample_rate`.
    #[must_use]
    pub fn ad_conversion(sample_rate: f64) -> Self {
        Self::Coefficients(Coefficients::fir(vec![1.0], sample_rate))
    }

    /// FIR filter at `input_sample_rate` followed by its decimator.
    ///
    /// `delay_samples` is the filter delay counted in input samples; it
    /// becomes the decimator's delay in seconds.
    #[must_use]
    pub fn fir_decimator(
        symmetry: FirSymmetry,
        half: &[f64],
        divisor: f64,
        input_sample_rate: f64,
        decimation_factor: u32,
        delay_samples: f64,
    ) -> [Self; 2] {
        [
            Self::Coefficients(Coefficients::fir_symmetric(
                symmetry,
                half,
                divisor,
                input_sample_rate,
            )),
            Self::Decimation(
                Decimation::new(input_sample_rate, decimation_factor)
                    .with_delay_samples(delay_samples),
            ),
        ]
    }

    /// Scalar gain stage.
    #[must_use]
    pub fn gain(sensitivity: f64, frequency_of_sensitivity: f64) -> Self {
        Self::Gain(Gain::new(sensitivity, frequency_of_sensitivity))
    }

    /// Short kind name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PolesZeros(_) => "PolesZeros",
            Self::Coefficients(_) => "Coefficients",
            Self::ResponseList(_) => "ResponseList",
            Self::Polynomial(_) => "Polynomial",
            Self::Decimation(_) => "Decimation",
            Self::Gain(_) => "Gain",
        }
    }

    /// Scalar gain if this is a `Gain` stage.
    #[must_use]
    pub fn gain_value(&self) -> Option<f64> {
        match self {
            Self::Gain(g) => Some(g.sensitivity),
            _ => None,
        }
    }

    /// Structural checks that do not depend on the evaluation frequency.
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: &str| ResponseError::InvalidStage {
            index,
            reason: reason.to_string(),
        };
        match self {
            Self::PolesZeros(pz) => {
                if !pz.normalization_factor.is_finite() {
                    return Err(invalid("normalization factor is not finite"));
                }
                if !pz.poles.iter().chain(&pz.zeros).all(|p| p.is_finite()) {
                    return Err(invalid("pole or zero is not finite"));
                }
            }
            Self::Coefficients(c) => {
                if c.numerator.is_empty() {
                    return Err(invalid("numerator is empty"));
                }
                if !all_finite(c.numerator.iter().chain(&c.denominator)) {
                    return Err(invalid("coefficient is not finite"));
                }
                if let Some(rate) = c.input_sample_rate {
                    if !(rate > 0.0 && rate.is_finite()) {
                        return Err(invalid("input sample rate must be positive"));
                    }
                }
            }
            Self::ResponseList(list) => {
                if list.entries.is_empty() {
                    return Err(invalid("response list is empty"));
                }
                if !list.entries.iter().all(|e| {
                    e.frequency.is_finite() && e.amplitude.is_finite() && e.phase.is_finite()
                }) {
                    return Err(invalid("response list entry is not finite"));
                }
                if list
                    .entries
                    .windows(2)
                    .any(|w| w[1].frequency <= w[0].frequency)
                {
                    return Err(invalid("response list frequencies must increase"));
                }
            }
            Self::Polynomial(p) => {
                let (low, high) = p.valid_frequency_range;
                if !all_finite(p.coefficients.iter().chain([&low, &high])) {
                    return Err(invalid("polynomial value is not finite"));
                }
                if !(low <= high) {
                    return Err(invalid("polynomial frequency range is inverted"));
                }
            }
            Self::Decimation(d) => {
                if d.decimation_factor == 0 {
                    return Err(invalid("decimation factor is zero"));
                }
                if !(d.input_sample_rate > 0.0 && d.input_sample_rate.is_finite()) {
                    return Err(invalid("input sample rate must be positive"));
                }
                if !(d.delay.is_finite() && d.correction_applied.is_finite()) {
                    return Err(invalid("decimation delay is not finite"));
                }
            }
            Self::Gain(g) => {
                if !g.sensitivity.is_finite() {
                    return Err(invalid("gain is not finite"));
                }
            }
        }
        Ok(())
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

// =============================================================================
// TESTS
// =============================================================================
