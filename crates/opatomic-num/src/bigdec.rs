//! Arbitrary-precision decimal values.
//!
//! A value is `(-1)^sign * significand * 10^exponent`, or one of the two
//! infinities. Canonical form: zero has a non-negative sign and exponent 0;
//! an infinity has a zero significand and exponent 0.
//!
//! Arithmetic aligns operands by *extending* the higher-exponent one:
//! multiplying its significand by a power of ten while decrementing its
//! exponent, which preserves the value. Alignment therefore always moves
//! toward the smaller exponent.

use crate::bigint::{BigInt, Digit, NumInt};
use crate::error::NumError;

/// Largest power of ten that fits a [`Digit`], used to batch extension.
const POW10_DIGIT: Digit = 1_000_000_000;

/// Number of decimal digits covered by [`POW10_DIGIT`].
const POW10_PER_DIGIT: u32 = 9;

/// Powers of ten up to `10^8` for the tail of a batched extension.
const POW10: [Digit; 9] =
    [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000, 100_000_000];

/// Sign of an infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Negative.
    Neg,
    /// Positive.
    Pos,
}

impl Sign {
    /// Sign from a negativity flag.
    #[must_use]
    pub fn from_negative(negative: bool) -> Self {
        if negative { Self::Neg } else { Self::Pos }
    }
}

/// A signed arbitrary-precision decimal, generic over the big-integer
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigDec<I: BigInt = NumInt> {
    sig: I,
    exp: i32,
    inf: Option<Sign>,
}

impl<I: BigInt> Default for BigDec<I> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<I: BigInt> BigDec<I> {
    /// Canonical zero.
    #[must_use]
    pub fn zero() -> Self {
        Self { sig: I::default(), exp: 0, inf: None }
    }

    /// An infinity of the given sign.
    #[must_use]
    pub fn infinity(sign: Sign) -> Self {
        Self { sig: I::default(), exp: 0, inf: Some(sign) }
    }

    /// Finite value from a 64-bit magnitude, a sign, and an exponent.
    /// A zero magnitude normalizes to canonical zero.
    #[must_use]
    pub fn from_u64(magnitude: u64, negative: bool, exponent: i32) -> Self {
        if magnitude == 0 {
            return Self::zero();
        }
        let mut sig = I::from_u64(magnitude);
        if negative {
            sig.negate_in_place();
        }
        Self { sig, exp: exponent, inf: None }
    }

    /// Finite value from a signed significand and an exponent, normalizing
    /// zero. This is the seam the wire codec builds decoded numbers through.
    #[must_use]
    pub fn from_parts(sig: I, exponent: i32) -> Self {
        let exp = if sig.is_zero() { 0 } else { exponent };
        Self { sig, exp, inf: None }
    }

    /// The significand. Zero when the value is an infinity.
    #[must_use]
    pub fn significand(&self) -> &I {
        &self.sig
    }

    /// The base-10 exponent. Zero for zero and for infinities.
    #[must_use]
    pub fn exponent(&self) -> i32 {
        self.exp
    }

    /// `Some(sign)` when the value is an infinity.
    #[must_use]
    pub fn infinity_sign(&self) -> Option<Sign> {
        self.inf
    }

    /// `true` for anything except the infinities.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.inf.is_none()
    }

    /// `true` for finite zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.inf.is_none() && self.sig.is_zero()
    }

    /// `true` for negative values and for negative infinity.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self.inf {
            Some(sign) => sign == Sign::Neg,
            None => self.sig.is_negative(),
        }
    }

    /// Flip the sign. Zero is unchanged.
    pub fn negate(&mut self) {
        match self.inf {
            Some(Sign::Neg) => self.inf = Some(Sign::Pos),
            Some(Sign::Pos) => self.inf = Some(Sign::Neg),
            None => self.sig.negate_in_place(),
        }
    }

    /// Multiply the significand by `10^amount` and decrement the exponent by
    /// `amount`. The decimal value is unchanged; only the stored digit count
    /// grows. Infinities are unchanged.
    ///
    /// # Errors
    ///
    /// `Overflow` when the decremented exponent would underflow `i32`.
    pub fn extend(&mut self, amount: u32) -> Result<(), NumError> {
        if amount == 0 || !self.is_finite() {
            return Ok(());
        }
        let target = i64::from(self.exp) - i64::from(amount);
        if target < i64::from(i32::MIN) {
            return Err(NumError::Overflow("exponent underflow in extend"));
        }
        let mut remaining = amount;
        while remaining >= POW10_PER_DIGIT {
            self.sig = self.sig.mul_digit(POW10_DIGIT);
            remaining -= POW10_PER_DIGIT;
        }
        if remaining > 0 {
            self.sig = self.sig.mul_digit(POW10[remaining as usize]);
        }
        self.exp = target as i32;
        Ok(())
    }

    /// Both operands, cloned and aligned to the smaller exponent.
    ///
    /// The alignment target is the *smaller* exponent so the extension can
    /// never underflow `i32`.
    fn aligned(&self, rhs: &Self) -> Result<(Self, Self), NumError> {
        let mut a = self.clone();
        let mut b = rhs.clone();
        if a.exp > b.exp {
            a.extend((i64::from(a.exp) - i64::from(b.exp)) as u32)?;
        } else if b.exp > a.exp {
            b.extend((i64::from(b.exp) - i64::from(a.exp)) as u32)?;
        }
        Ok((a, b))
    }

    /// `self + rhs`.
    ///
    /// # Errors
    ///
    /// `Overflow` on `(+inf) + (-inf)` (and the mirror case).
    pub fn add(&self, rhs: &Self) -> Result<Self, NumError> {
        match (self.inf, rhs.inf) {
            (Some(a), Some(b)) if a != b => {
                Err(NumError::Overflow("sum of opposite infinities"))
            },
            (Some(sign), _) | (_, Some(sign)) => Ok(Self::infinity(sign)),
            (None, None) => {
                if self.is_zero() {
                    return Ok(rhs.clone());
                }
                if rhs.is_zero() {
                    return Ok(self.clone());
                }
                let (a, b) = self.aligned(rhs)?;
                Ok(Self::from_parts(a.sig.add(&b.sig), a.exp))
            },
        }
    }

    /// `self - rhs`.
    ///
    /// # Errors
    ///
    /// `Overflow` when both operands are the same infinity.
    pub fn sub(&self, rhs: &Self) -> Result<Self, NumError> {
        match (self.inf, rhs.inf) {
            (Some(a), Some(b)) if a == b => {
                Err(NumError::Overflow("difference of equal infinities"))
            },
            (Some(sign), _) => Ok(Self::infinity(sign)),
            (None, Some(Sign::Pos)) => Ok(Self::infinity(Sign::Neg)),
            (None, Some(Sign::Neg)) => Ok(Self::infinity(Sign::Pos)),
            (None, None) => {
                let (a, b) = self.aligned(rhs)?;
                Ok(Self::from_parts(a.sig.sub(&b.sig), a.exp))
            },
        }
    }

    /// `self * rhs`. Any infinity times finite zero is finite zero;
    /// otherwise an infinite operand wins with the XOR of the signs.
    ///
    /// # Errors
    ///
    /// `Overflow` when the result exponent falls outside `i32`.
    pub fn mul(&self, rhs: &Self) -> Result<Self, NumError> {
        if self.inf.is_some() || rhs.inf.is_some() {
            if self.is_zero() || rhs.is_zero() {
                return Ok(Self::zero());
            }
            let negative = self.is_negative() != rhs.is_negative();
            return Ok(Self::infinity(Sign::from_negative(negative)));
        }
        let sig = self.sig.mul(&rhs.sig);
        if sig.is_zero() {
            return Ok(Self::zero());
        }
        let exp = i64::from(self.exp) + i64::from(rhs.exp);
        if exp < i64::from(i32::MIN) || exp > i64::from(i32::MAX) {
            return Err(NumError::Overflow("product exponent outside i32"));
        }
        Ok(Self { sig, exp: exp as i32, inf: None })
    }

    /// Magnitude of the value as an exact `u64` integer.
    ///
    /// # Errors
    ///
    /// `Overflow` when the value is infinite, is not an exact integer
    /// (a negative exponent leaves a remainder), or does not fit 64 bits.
    pub fn magnitude_u64(&self) -> Result<u64, NumError> {
        if !self.is_finite() {
            return Err(NumError::Overflow("infinite value"));
        }
        if self.exp > 0 {
            if self.sig.bit_count() > 64 {
                return Err(NumError::Overflow("significand exceeds 64 bits"));
            }
            let mut value = self.sig.magnitude_u64();
            let mut exp = self.exp;
            while exp > 0 && value <= u64::MAX / 10 {
                value *= 10;
                exp -= 1;
            }
            if exp > 0 {
                return Err(NumError::Overflow("scaled value exceeds 64 bits"));
            }
            return Ok(value);
        }
        if self.exp < 0 {
            let mut sig = self.sig.clone();
            let mut exp = self.exp;
            while exp < 0 {
                let (quotient, rem) = sig.div_digit(10)?;
                if rem != 0 {
                    return Err(NumError::Overflow("value is not an exact integer"));
                }
                sig = quotient;
                exp += 1;
            }
            if sig.bit_count() > 64 {
                return Err(NumError::Overflow("scaled value exceeds 64 bits"));
            }
            return Ok(sig.magnitude_u64());
        }
        if self.sig.bit_count() > 64 {
            return Err(NumError::Overflow("significand exceeds 64 bits"));
        }
        Ok(self.sig.magnitude_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigint::LimbInt;

    type Dec = BigDec<NumInt>;

    #[test]
    fn zero_is_canonical() {
        let z = Dec::from_u64(0, true, 55);
        assert!(z.is_zero());
        assert!(!z.is_negative());
        assert_eq!(z.exponent(), 0);
    }

    #[test]
    fn extend_preserves_value() {
        let mut a = Dec::from_u64(21, false, 2); // 2100
        a.extend(3).expect("in range");
        assert_eq!(a.exponent(), -1);
        assert_eq!(a.significand().magnitude_u64(), 21_000);
        assert_eq!(a.magnitude_u64().expect("exact"), 2100);
    }

    #[test]
    fn extend_rejects_exponent_underflow() {
        let mut a = Dec::from_u64(1, false, i32::MIN + 1);
        assert_eq!(a.extend(2), Err(NumError::Overflow("exponent underflow in extend")));
        // Exactly reaching i32::MIN is fine.
        assert!(a.extend(1).is_ok());
        assert_eq!(a.exponent(), i32::MIN);
    }

    #[test]
    fn add_aligns_exponents() {
        let a = Dec::from_u64(12, false, 2); // 1200
        let b = Dec::from_u64(34, false, 0); // 34
        let sum = a.add(&b).expect("finite");
        assert_eq!(sum.exponent(), 0);
        assert_eq!(sum.magnitude_u64().expect("exact"), 1234);
    }

    #[test]
    fn sub_to_zero_resets_exponent() {
        let a = Dec::from_u64(5, true, 7);
        let diff = a.sub(&a).expect("finite");
        assert!(diff.is_zero());
        assert_eq!(diff.exponent(), 0);
    }

    #[test]
    fn mul_adds_exponents() {
        let a = Dec::from_u64(3, false, 5);
        let b = Dec::from_u64(2, true, -2);
        let product = a.mul(&b).expect("finite");
        assert!(product.is_negative());
        assert_eq!(product.exponent(), 3);
        assert_eq!(product.significand().magnitude_u64(), 6);
    }

    #[test]
    fn infinity_rules() {
        let pos = Dec::infinity(Sign::Pos);
        let neg = Dec::infinity(Sign::Neg);
        let one = Dec::from_u64(1, false, 0);

        assert!(pos.add(&neg).is_err());
        assert_eq!(pos.add(&one).expect("inf"), pos);
        assert!(pos.sub(&pos).is_err());
        assert_eq!(one.sub(&pos).expect("inf"), neg);
        assert_eq!(pos.mul(&Dec::zero()).expect("zero"), Dec::zero());
        assert_eq!(pos.mul(&neg).expect("inf"), neg);
        assert_eq!(neg.mul(&neg).expect("inf"), pos);
    }

    #[test]
    fn magnitude_u64_positive_exponent() {
        let a = Dec::from_u64(21, false, 3);
        assert_eq!(a.magnitude_u64().expect("exact"), 21_000);
        let too_big = Dec::from_u64(u64::MAX, false, 1);
        assert!(too_big.magnitude_u64().is_err());
    }

    #[test]
    fn magnitude_u64_negative_exponent() {
        let a = Dec::from_u64(21_000, true, -3);
        assert_eq!(a.magnitude_u64().expect("exact"), 21);
        let inexact = Dec::from_u64(21_005, false, -1);
        assert!(inexact.magnitude_u64().is_err());
    }

    #[test]
    fn works_with_limb_backend() {
        let a = BigDec::<LimbInt>::from_u64(125, true, -5);
        let b = BigDec::<LimbInt>::from_u64(125, true, -5);
        let sum = a.add(&b).expect("finite");
        assert_eq!(sum.significand().magnitude_u64(), 250);
        assert_eq!(sum.exponent(), -5);
        assert!(sum.is_negative());
    }
}
