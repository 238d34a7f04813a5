//! # Frequency Grid
//!
//! The set of frequencies (Hz) a response is evaluated at: a linear or
//! logarithmic sweep, or an explicit list.
//!
//! Grids are plain configuration. [`FrequencyGrid::iter`] materializes the
//! points lazily and can be called any number of times with identical
//! results.

use crate::error::{ResponseError, Result};
use serde::{Deserialize, Serialize};

/// Spacing of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spacing {
    Linear,
    #[default]
    Logarithmic,
}

/// Frequency-set configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyGrid {
    /// `num_points` frequencies from `start` to `stop`, both included.
    Sweep {
        start: f64,
        stop: f64,
        num_points: usize,
        #[serde(default)]
        spacing: Spacing,
    },
    /// Caller-supplied frequencies, kept in the given order.
    Explicit(Vec<f64>),
}

impl FrequencyGrid {
    /// `num_points` evenly spaced frequencies from `start` to `stop` Hz.
    #[must_use]
    pub fn linear(start: f64, stop: f64, num_points: usize) -> Self {
        Self::Sweep {
            start,
            stop,
            num_points,
            spacing: Spacing::Linear,
        }
    }

    /// `num_points` frequencies evenly spaced in log frequency.
    #[must_use]
    pub fn logarithmic(start: f64, stop: f64, num_points: usize) -> Self {
        Self::Sweep {
            start,
            stop,
            num_points,
            spacing: Spacing::Logarithmic,
        }
    }

    /// Caller-supplied frequencies, evaluated in the given order.
    #[must_use]
    pub fn explicit(frequencies: Vec<f64>) -> Self {
        Self::Explicit(frequencies)
    }

    /// Check the configuration. Must pass before any evaluation starts.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ResponseError::InvalidRange(msg));
        match self {
            Self::Sweep {
                start,
                stop,
                num_points,
                spacing,
            } => {
                if !start.is_finite() || !stop.is_finite() {
                    return invalid(format!("bounds must be finite ({start}, {stop})"));
                }
                if *start < 0.0 {
                    return invalid(format!("start {start} is negative"));
                }
                if stop < start {
                    return invalid(format!("stop {stop} is below start {start}"));
                }
                if *num_points == 0 {
                    return invalid("number of points is zero".to_string());
                }
                if *num_points > 1 && start == stop {
                    return invalid(format!(
                        "{num_points} points requested over the empty range at {start}"
                    ));
                }
                if *spacing == Spacing::Logarithmic && *start <= 0.0 {
                    return invalid(format!(
                        "logarithmic spacing requires start > 0, got {start}"
                    ));
                }
                // Ranges narrower than the float spacing repeat points.
                if let Some(i) =
                    (1..*num_points).find(|&i| self.point(i) <= self.point(i - 1))
                {
                    return invalid(format!(
                        "{num_points} points over [{start}, {stop}] are not distinct at index {i}"
                    ));
                }
            }
            Self::Explicit(frequencies) => {
                if frequencies.is_empty() {
                    return invalid("explicit frequency list is empty".to_string());
                }
                if let Some(f) = frequencies.iter().find(|f| !(f.is_finite() && **f >= 0.0)) {
                    return invalid(format!("frequency {f} is negative or not finite"));
                }
                let mut sorted = frequencies.clone();
                sorted.sort_by(f64::total_cmp);
                if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
                    return invalid(format!("frequency {} listed twice", w[0]));
                }
            }
        }
        Ok(())
    }

    /// Number of frequencies the grid produces.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sweep { num_points, .. } => *num_points,
            Self::Explicit(frequencies) => frequencies.len(),
        }
    }

    /// True when the grid yields no frequencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy iterator over the grid's frequencies.
    #[must_use]
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            index: 0,
        }
    }

    /// Materialize the grid, validating first.
    pub fn to_vec(&self) -> Result<Vec<f64>> {
        self.validate()?;
        Ok(self.iter().collect())
    }

    fn point(&self, index: usize) -> f64 {
        match self {
            Self::Explicit(frequencies) => frequencies[index],
            Self::Sweep {
                start,
                stop,
                num_points,
                spacing,
            } => {
                let last = num_points.saturating_sub(1);
                if index == 0 || last == 0 {
                    return *start;
                }
                if index == last {
                    return *stop;
                }
                let t = index as f64 / last as f64;
                match spacing {
                    Spacing::Linear => start + (stop - start) * t,
                    Spacing::Logarithmic => {
                        let (ln_start, ln_stop) = (start.ln(), stop.ln());
                        (ln_start + (ln_stop - ln_start) * t).exp()
                    }
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a FrequencyGrid {
    type Item = f64;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> GridIter<'a> {
        self.iter()
    }
}

/// Iterator over a [`FrequencyGrid`].
#[derive(Debug, Clone)]
pub struct GridIter<'a> {
    grid: &'a FrequencyGrid,
    index: usize,
}

impl Iterator for GridIter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.grid.len() {
            return None;
        }
        let value = self.grid.point(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIter<'_> {}

// =============================================================================
// TESTS
// =============================================================================
