//! # Complex Module
//!
//! Transfer-function arithmetic on [`num_complex::Complex64`].
//!
//! Plain IEEE-754 semantics otherwise. The checked operations here refuse a
//! zero-magnitude divisor instead of producing NaN or infinity.

use crate::error::{ResponseError, Result};

pub use num_complex::Complex64;

/// Multiplicative identity.
pub const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Additive identity.
pub const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Division-safe operations used wherever a stage can hit a singularity.
pub trait ComplexExt: Sized {
    /// `self / rhs`, failing with [`ResponseError::DivisionByZero`] on a zero divisor.
    fn checked_div(self, rhs: Self) -> Result<Self>;

    /// `1 / self`, failing on zero.
    fn checked_recip(self) -> Result<Self>;

    /// Integer power. Negative exponents go through [`ComplexExt::checked_recip`].
    fn checked_powi(self, n: i32) -> Result<Self>;
}

impl ComplexExt for Complex64 {
    fn checked_div(self, rhs: Self) -> Result<Self> {
        if rhs.norm_sqr() == 0.0 {
            return Err(ResponseError::DivisionByZero);
        }
        Ok(self / rhs)
    }

    fn checked_recip(self) -> Result<Self> {
        ONE.checked_div(self)
    }

    fn checked_powi(self, n: i32) -> Result<Self> {
        let power = self.powi(n.saturating_abs());
        if n < 0 { power.checked_recip() } else { Ok(power) }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn division_inverts_multiplication() {
        let a = Complex64::new(1.5, -2.5);
        let b = Complex64::new(0.3, 4.0);
        let q = (a * b).checked_div(b).unwrap();
        assert!(close(q, a));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = ONE.checked_div(ZERO).unwrap_err();
        assert_eq!(err, ResponseError::DivisionByZero);
        assert!(ZERO.checked_recip().is_err());
    }

    #[test]
    fn integer_powers() {
        let jw = Complex64::new(0.0, 2.0);
        assert!(close(jw.checked_powi(2).unwrap(), Complex64::from(-4.0)));
        assert!(close(jw.checked_powi(-1).unwrap(), Complex64::new(0.0, -0.5)));
        assert_eq!(jw.checked_powi(0).unwrap(), ONE);
        assert!(ZERO.checked_powi(-2).is_err());
    }
}
