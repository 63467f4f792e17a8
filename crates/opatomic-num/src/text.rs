//! Decimal text parsing and formatting.
//!
//! Radix 2 through 10 both ways (higher radices would collide with the
//! `e`/`E` exponent separator). Formatting picks between a plain rendering
//! and scientific notation from the adjusted exponent
//! `adjusted = exponent + digit_count - 1`:
//!
//! - `0 <= exponent <= 6`: digits with zeros appended
//! - `exponent < 0`, `adjusted >= 0`: decimal point inside the digits
//! - `exponent < 0`, `adjusted >= -6`: `0.` plus leading zeros
//! - otherwise: `d.dddE<signed adjusted>`
//!
//! Trailing zeros after a decimal point are always dropped.

use std::fmt;
use std::str::FromStr;

use crate::bigdec::{BigDec, Sign};
use crate::bigint::{BigInt, Digit};
use crate::error::NumError;

/// Recognize an infinity literal: `inf` or `infinity`, case-insensitive,
/// with an optional leading sign. Returns the sign when matched.
#[must_use]
pub fn is_inf_str(s: &str) -> Option<Sign> {
    let (sign, body) = match s.as_bytes().first() {
        Some(b'-') => (Sign::Neg, &s[1..]),
        Some(b'+') => (Sign::Pos, &s[1..]),
        _ => (Sign::Pos, s),
    };
    if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity") {
        Some(sign)
    } else {
        None
    }
}

/// Decimal digits of the magnitude of `value` in `radix`, most significant
/// first. Batches the divide-by-digit into the largest power of the radix
/// that fits a digit, so the quadratic conversion touches the big integer
/// as few times as possible.
fn magnitude_digits<I: BigInt>(value: &I, radix: u32) -> String {
    let mut batch: Digit = radix;
    let mut per_batch = 1usize;
    while let Some(next) = batch.checked_mul(radix) {
        batch = next;
        per_batch += 1;
    }

    let mut mag = value.clone();
    mag.abs_in_place();
    let mut chunks: Vec<Digit> = Vec::new();
    while !mag.is_zero() {
        let (quotient, rem) = mag
            .div_digit(batch)
            .unwrap_or_else(|_| unreachable!("batch divisor is a power of the radix"));
        chunks.push(rem);
        mag = quotient;
    }
    if chunks.is_empty() {
        return "0".to_string();
    }

    let mut out = String::with_capacity(chunks.len() * per_batch);
    for (i, &chunk) in chunks.iter().rev().enumerate() {
        let mut rev = Vec::new();
        let mut v = chunk;
        while v > 0 {
            rev.push((v % radix) as u8);
            v /= radix;
        }
        if i > 0 {
            for _ in rev.len()..per_batch {
                out.push('0');
            }
        }
        for &d in rev.iter().rev() {
            out.push(char::from(b'0' + d));
        }
    }
    out
}

/// Drop trailing zeros after a decimal point, and the point itself if the
/// whole fraction goes away.
fn trim_fraction(s: &mut String) {
    if !s.contains('.') {
        return;
    }
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
}

/// Append `E` plus the signed adjusted exponent rendered in `radix`.
fn push_exponent(out: &mut String, adjusted: i64, radix: u32) {
    out.push('E');
    out.push(if adjusted < 0 { '-' } else { '+' });
    let mut v = adjusted.unsigned_abs();
    if v == 0 {
        out.push('0');
        return;
    }
    let mut rev = Vec::new();
    while v > 0 {
        rev.push((v % u64::from(radix)) as u8);
        v /= u64::from(radix);
    }
    for &d in rev.iter().rev() {
        out.push(char::from(b'0' + d));
    }
}

impl<I: BigInt> BigDec<I> {
    /// Parse a number from text.
    ///
    /// Grammar: optional sign, at least one digit, optional `.` followed by
    /// at least one digit, optional `e`/`E` exponent with its own optional
    /// sign. `inf`/`infinity` (any case, optional sign) parse to the
    /// infinities. Zero parses to canonical zero regardless of written sign
    /// or exponent.
    ///
    /// # Errors
    ///
    /// `InvalidArg` for an unsupported radix, `Parse` for a syntax
    /// violation, `Overflow` when the effective exponent falls outside
    /// `i32`.
    pub fn from_str_radix(s: &str, radix: u32) -> Result<Self, NumError> {
        if !(2..=10).contains(&radix) {
            return Err(NumError::InvalidArg("radix must be 2..=10"));
        }
        if let Some(sign) = is_inf_str(s) {
            return Ok(Self::infinity(sign));
        }

        let bytes = s.as_bytes();
        let mut pos = 0usize;
        let negative = match bytes.first() {
            Some(b'-') => {
                pos += 1;
                true
            },
            Some(b'+') => {
                pos += 1;
                false
            },
            _ => false,
        };

        let digit_at = |i: usize| -> Option<u32> {
            match bytes.get(i) {
                Some(&b) if b.is_ascii_digit() => Some(u32::from(b - b'0')),
                _ => None,
            }
        };

        if digit_at(pos).is_none() {
            return Err(NumError::Parse("expected a digit"));
        }

        let mut sig = I::default();
        let mut frac_digits: u64 = 0;
        while let Some(d) = digit_at(pos) {
            if d >= radix {
                return Err(NumError::Parse("digit out of range for radix"));
            }
            sig = sig.mul_digit(radix).add_digit(d);
            pos += 1;
        }
        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            if digit_at(pos).is_none() {
                return Err(NumError::Parse("expected a digit after the decimal point"));
            }
            while let Some(d) = digit_at(pos) {
                if d >= radix {
                    return Err(NumError::Parse("digit out of range for radix"));
                }
                sig = sig.mul_digit(radix).add_digit(d);
                frac_digits += 1;
                pos += 1;
            }
        }

        let mut explicit_exp: i64 = 0;
        if matches!(bytes.get(pos), Some(b'e' | b'E')) {
            pos += 1;
            let exp_negative = match bytes.get(pos) {
                Some(b'-') => {
                    pos += 1;
                    true
                },
                Some(b'+') => {
                    pos += 1;
                    false
                },
                _ => false,
            };
            if digit_at(pos).is_none() {
                return Err(NumError::Parse("expected a digit in the exponent"));
            }
            let mut value: u64 = 0;
            while let Some(d) = digit_at(pos) {
                value = value * u64::from(radix) + u64::from(d);
                let limit = if exp_negative {
                    u64::from(i32::MAX as u32) + 1
                } else {
                    u64::from(i32::MAX as u32)
                };
                if value > limit {
                    return Err(NumError::Overflow("exponent outside i32"));
                }
                pos += 1;
            }
            explicit_exp = if exp_negative { -(value as i64) } else { value as i64 };
        }

        if pos != bytes.len() {
            return Err(NumError::Parse("unexpected character"));
        }

        let exponent = explicit_exp - frac_digits as i64;
        if exponent < i64::from(i32::MIN) || exponent > i64::from(i32::MAX) {
            return Err(NumError::Overflow("exponent outside i32"));
        }

        if sig.is_zero() {
            return Ok(Self::zero());
        }
        if negative {
            sig.negate_in_place();
        }
        Ok(Self::from_parts(sig, exponent as i32))
    }

    /// Format the value in `radix`. Infinities render as `inf`/`-inf`, zero
    /// as `0`; everything else follows the module-level heuristics. The
    /// adjusted exponent after `E` is rendered in the same radix.
    ///
    /// # Errors
    ///
    /// `InvalidArg` for an unsupported radix.
    pub fn to_radix_string(&self, radix: u32) -> Result<String, NumError> {
        if !(2..=10).contains(&radix) {
            return Err(NumError::InvalidArg("radix must be 2..=10"));
        }
        if let Some(sign) = self.infinity_sign() {
            return Ok(match sign {
                Sign::Neg => "-inf".to_string(),
                Sign::Pos => "inf".to_string(),
            });
        }
        if self.is_zero() {
            return Ok("0".to_string());
        }

        let digits = magnitude_digits(self.significand(), radix);
        let n = digits.len() as i64;
        let e = i64::from(self.exponent());
        let adjusted = e + n - 1;

        let mut out = String::new();
        if self.is_negative() {
            out.push('-');
        }
        if (0..=6).contains(&e) {
            out.push_str(&digits);
            for _ in 0..e {
                out.push('0');
            }
        } else if e < 0 && adjusted >= 0 {
            let point = (n + e) as usize;
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
            trim_fraction(&mut out);
        } else if e < 0 && adjusted >= -6 {
            out.push_str("0.");
            for _ in 0..(-adjusted - 1) {
                out.push('0');
            }
            out.push_str(&digits);
            trim_fraction(&mut out);
        } else {
            out.push_str(&digits[..1]);
            if n > 1 {
                out.push('.');
                out.push_str(&digits[1..]);
                trim_fraction(&mut out);
            }
            push_exponent(&mut out, adjusted, radix);
        }
        Ok(out)
    }
}

impl<I: BigInt> fmt::Display for BigDec<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_radix_string(10) {
            Ok(s) => f.write_str(&s),
            // Radix 10 is always in range.
            Err(_) => Err(fmt::Error),
        }
    }
}

impl<I: BigInt> FromStr for BigDec<I> {
    type Err = NumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_radix(s, 10)
    }
}
