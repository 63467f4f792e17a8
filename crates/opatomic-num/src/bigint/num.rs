//! `num-bigint` backend.

use std::cmp::Ordering;

use num_bigint::Sign as NumSign;

use crate::bigint::{BigInt, Digit};
use crate::error::NumError;

/// [`BigInt`] backend over [`num_bigint::BigInt`]. This is the default.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct NumInt(num_bigint::BigInt);

impl BigInt for NumInt {
    const NAME: &'static str = "num-bigint";

    fn set_u64(&mut self, value: u64) {
        self.0 = num_bigint::BigInt::from(value);
    }

    fn set_zero(&mut self) {
        self.0 = num_bigint::BigInt::default();
    }

    fn is_zero(&self) -> bool {
        self.0.sign() == NumSign::NoSign
    }

    fn is_negative(&self) -> bool {
        self.0.sign() == NumSign::Minus
    }

    fn is_even(&self) -> bool {
        !self.0.bit(0)
    }

    fn bit_count(&self) -> u64 {
        self.0.bits()
    }

    fn magnitude_u64(&self) -> u64 {
        self.0.magnitude().iter_u64_digits().next().unwrap_or(0)
    }

    fn abs_in_place(&mut self) {
        if self.is_negative() {
            self.negate_in_place();
        }
    }

    fn negate_in_place(&mut self) {
        self.0 = -std::mem::take(&mut self.0);
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.0.magnitude().cmp(other.0.magnitude())
    }

    fn add(&self, rhs: &Self) -> Self {
        Self(&self.0 + &rhs.0)
    }

    fn sub(&self, rhs: &Self) -> Self {
        Self(&self.0 - &rhs.0)
    }

    fn mul(&self, rhs: &Self) -> Self {
        Self(&self.0 * &rhs.0)
    }

    fn add_digit(&self, digit: Digit) -> Self {
        Self(&self.0 + digit)
    }

    fn mul_digit(&self, digit: Digit) -> Self {
        Self(&self.0 * digit)
    }

    fn div_digit(&self, digit: Digit) -> Result<(Self, Digit), NumError> {
        if digit == 0 {
            return Err(NumError::InvalidArg("division by zero digit"));
        }
        let quotient_mag = self.0.magnitude() / digit;
        let remainder = (self.0.magnitude() % digit).iter_u32_digits().next().unwrap_or(0);
        let sign = if self.is_negative() && quotient_mag != num_bigint::BigUint::default() {
            NumSign::Minus
        } else {
            NumSign::Plus
        };
        Ok((Self(num_bigint::BigInt::from_biguint(sign, quotient_mag)), remainder))
    }

    fn from_magnitude_be(bytes: &[u8]) -> Self {
        Self(num_bigint::BigInt::from_bytes_be(NumSign::Plus, bytes))
    }

    fn limb_count(&self) -> usize {
        self.0.magnitude().iter_u32_digits().len()
    }

    fn limb(&self, index: usize) -> Digit {
        self.0.magnitude().iter_u32_digits().nth(index).unwrap_or(0)
    }

    fn magnitude_be(&self) -> Vec<u8> {
        if self.is_zero() {
            Vec::new()
        } else {
            self.0.magnitude().to_bytes_be()
        }
    }
}
