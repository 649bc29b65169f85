//! # Fixed-Point Arithmetic
//!
//! Signed fixed-point numbers for the feedback scheduler's load average,
//! recent-CPU and priority calculations. The kernel has no floating point,
//! so every real-valued quantity the scheduler needs is carried as a
//! [`Fixed`]: an `i32` whose low [`FRACTION_BITS`] bits hold the fraction.
//!
//! ## Representation
//!
//! ```text
//!   31  30            17 16                0
//! ┌────┬────────────────┬──────────────────┐
//! │sign│ integer (14)   │ fraction (17)    │
//! └────┴────────────────┴──────────────────┘
//! ```
//!
//! There is no NaN or infinity. Overflow wraps like native `i32`
//! arithmetic and is never checked. Division by zero panics exactly like
//! native integer division.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

/// Number of fractional bits.
pub const FRACTION_BITS: u32 = 17;

/// Number of integer bits (excluding the sign bit).
pub const INTEGER_BITS: u32 = 14;

const _: () = assert!(
    FRACTION_BITS + INTEGER_BITS == i32::BITS - 1,
    "fraction and integer bits must add up to 32 bits minus 1 for the sign"
);

/// `1.0` in the raw representation.
const SCALE: i32 = 1 << FRACTION_BITS;

/// `0.5` in the raw representation.
const HALF: i32 = SCALE / 2;

/// A signed fixed-point number with [`FRACTION_BITS`] fractional bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SCALE);

    /// Wrap a raw representation.
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Fixed(bits)
    }

    /// The raw representation.
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Convert an integer to fixed point.
    #[inline]
    pub const fn from_integer(n: i32) -> Self {
        Fixed(n << FRACTION_BITS)
    }

    /// Convert to an integer, rounding toward zero.
    #[inline]
    pub const fn to_integer_truncate(self) -> i32 {
        self.0 / SCALE
    }

    /// Convert to the nearest integer. Halves round away from zero.
    #[inline]
    pub const fn to_integer_round(self) -> i32 {
        let raw = self.0 as i64;
        let rounded = if raw >= 0 {
            (raw + HALF as i64) / SCALE as i64
        } else {
            (raw - HALF as i64) / SCALE as i64
        };
        rounded as i32
    }

    #[inline]
    pub const fn add(self, other: Fixed) -> Self {
        Fixed(self.0.wrapping_add(other.0))
    }

    #[inline]
    pub const fn sub(self, other: Fixed) -> Self {
        Fixed(self.0.wrapping_sub(other.0))
    }

    #[inline]
    pub const fn add_integer(self, n: i32) -> Self {
        self.add(Fixed::from_integer(n))
    }

    #[inline]
    pub const fn sub_integer(self, n: i32) -> Self {
        self.sub(Fixed::from_integer(n))
    }

    /// Multiply two fixed-point numbers.
    ///
    /// The product is formed in 64 bits before rescaling, so operands
    /// whose raw product overflows `i32` still multiply correctly as long
    /// as the rescaled result fits.
    #[inline]
    pub const fn mul(self, other: Fixed) -> Self {
        Fixed(((self.0 as i64) * (other.0 as i64) / SCALE as i64) as i32)
    }

    #[inline]
    pub const fn mul_integer(self, n: i32) -> Self {
        Fixed(self.0.wrapping_mul(n))
    }

    /// Divide two fixed-point numbers.
    ///
    /// # Panics
    /// Panics if `other` is zero.
    #[inline]
    pub const fn div(self, other: Fixed) -> Self {
        Fixed(((self.0 as i64) * (SCALE as i64) / (other.0 as i64)) as i32)
    }

    /// Divide by an integer.
    ///
    /// # Panics
    /// Panics if `n` is zero.
    #[inline]
    pub const fn div_integer(self, n: i32) -> Self {
        Fixed(self.0.wrapping_div(n))
    }

    /// [`Fixed::div`], or `None` when `other` is zero.
    #[inline]
    pub const fn checked_div(self, other: Fixed) -> Option<Self> {
        if other.0 == 0 {
            None
        } else {
            Some(self.div(other))
        }
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed::add(self, rhs)
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed::sub(self, rhs)
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed::mul(self, rhs)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed::div(self, rhs)
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;
    fn add(self, rhs: i32) -> Fixed {
        self.add_integer(rhs)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: i32) -> Fixed {
        self.sub_integer(rhs)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: i32) -> Fixed {
        self.mul_integer(rhs)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;
    fn div(self, rhs: i32) -> Fixed {
        self.div_integer(rhs)
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl From<i32> for Fixed {
    fn from(n: i32) -> Self {
        Fixed::from_integer(n)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({} = {:#x})", self, self.0)
    }
}

/// Prints the value with two decimal places, rounded to nearest.
impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.mul_integer(100).to_integer_round();
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_round_trip() {
        for n in [0, 1, 2, 59, 60, 63, 100, 16383, -1, -2, -63, -16384] {
            assert_eq!(Fixed::from_integer(n).to_integer_truncate(), n);
            assert_eq!(Fixed::from_integer(n).to_integer_round(), n);
        }
    }

    #[test]
    fn test_round_at_range_limits() {
        assert_eq!(Fixed::from_bits(i32::MIN).to_integer_round(), -16384);
        assert_eq!(Fixed::from_bits(i32::MIN).to_integer_truncate(), -16384);
        // 16383.99999...
        assert_eq!(Fixed::from_bits(i32::MAX).to_integer_round(), 16384);
        assert_eq!(Fixed::from_bits(i32::MAX).to_integer_truncate(), 16383);

        let top_half = Fixed::from_integer(16383) + Fixed::ONE / 2;
        assert_eq!(top_half.to_integer_round(), 16384);
        let bottom_half = Fixed::from_integer(-16383) - Fixed::ONE / 2;
        assert_eq!(bottom_half.to_integer_round(), -16384);
    }

    #[test]
    fn test_truncate_rounds_toward_zero() {
        let x = Fixed::from_integer(7).div_integer(2); // 3.5
        assert_eq!(x.to_integer_truncate(), 3);
        assert_eq!((-x).to_integer_truncate(), -3);

        let tiny = Fixed::from_bits(1);
        assert_eq!(tiny.to_integer_truncate(), 0);
        assert_eq!((-tiny).to_integer_truncate(), 0);
    }

    #[test]
    fn test_round_ties_away_from_zero() {
        assert_eq!(Fixed::from_bits(SCALE / 2).to_integer_round(), 1);
        assert_eq!(Fixed::from_bits(-SCALE / 2).to_integer_round(), -1);
        assert_eq!(Fixed::from_bits(SCALE / 2 - 1).to_integer_round(), 0);
        assert_eq!(Fixed::from_bits(-SCALE / 2 + 1).to_integer_round(), 0);

        let two_and_a_half = Fixed::from_integer(5).div_integer(2);
        assert_eq!(two_and_a_half.to_integer_round(), 3);
        assert_eq!((-two_and_a_half).to_integer_round(), -3);
    }

    #[test]
    fn test_add_sub_inverse() {
        let x = Fixed::from_integer(59).div_integer(60);
        let y = Fixed::from_integer(-3).div_integer(7);
        assert_eq!(x.add(y).sub(y), x);
        assert_eq!((x + y) - y, x);
        assert_eq!(x.add_integer(5).sub_integer(5), x);
    }

    #[test]
    fn test_mul_widens() {
        let a = Fixed::from_integer(100);
        let b = Fixed::from_integer(100);
        // The raw product (100 << 17)^2 does not fit in an i32.
        assert!((a.to_bits() as i64) * (b.to_bits() as i64) > i32::MAX as i64);
        assert_eq!(a.mul(b).to_integer_truncate(), 10_000);

        let big = Fixed::from_integer(16_000);
        let half = Fixed::ONE.div_integer(2);
        assert_eq!((big * half).to_integer_truncate(), 8_000);
    }

    #[test]
    fn test_mul_fractions() {
        let half = Fixed::ONE / 2;
        let quarter = half * half;
        assert_eq!(quarter, Fixed::ONE / 4);
        assert_eq!((Fixed::from_integer(-6) * half).to_integer_truncate(), -3);
    }

    #[test]
    fn test_mul_integer_and_div_integer() {
        let x = Fixed::from_integer(3).div_integer(4); // 0.75
        assert_eq!((x * 4).to_integer_truncate(), 3);
        assert_eq!(x.mul_integer(10).to_integer_round(), 8); // 7.5 rounds up
    }

    #[test]
    fn test_div() {
        let x = Fixed::from_integer(59);
        let y = Fixed::from_integer(60);
        let q = x / y;
        assert_eq!(q.mul_integer(60).to_integer_round(), 59);

        let big = Fixed::from_integer(10_000);
        assert_eq!(big.div(Fixed::from_integer(4)).to_integer_truncate(), 2_500);
        assert_eq!((Fixed::from_integer(-9) / Fixed::from_integer(2)).to_integer_round(), -5);
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert_eq!(Fixed::ONE.checked_div(Fixed::ZERO), None);
        assert_eq!(Fixed::from_integer(6).checked_div(Fixed::from_integer(3)), Some(Fixed::from_integer(2)));
    }

    #[test]
    #[should_panic]
    fn test_div_by_zero_panics() {
        let _ = core::hint::black_box(Fixed::ONE).div(core::hint::black_box(Fixed::ZERO));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Fixed::from_integer(2)), "2.00");
        assert_eq!(format!("{}", Fixed::ONE / 4), "0.25");
        assert_eq!(format!("{}", -(Fixed::ONE / 2)), "-0.50");
    }
}
