//! Numeric engine
//!
//! Arbitrary-precision numbers for the Opatomic protocol, in the form
//! `(-1)^sign * significand * 10^exponent` plus the two infinities.
//!
//! # Architecture
//!
//! The unbounded integer is a pluggable capability: [`BigInt`] is a small
//! trait covering exactly the operations the decimal engine needs, with two
//! backends behind it:
//!
//! - [`NumInt`]: wraps `num_bigint::BigInt` (the default)
//! - [`LimbInt`]: a self-contained sign-magnitude implementation
//!
//! [`BigDec`] is generic over the backend and carries the decimal logic:
//! exponent alignment ("extend"), add/sub/mul with infinity rules, bounded
//! 64-bit conversion, and text parsing/formatting. Wire encoding of numbers
//! lives in the protocol crate; this crate knows nothing about byte formats
//! beyond big-endian magnitude import/export.

mod bigdec;
mod bigint;
mod error;
mod text;

pub use bigdec::{BigDec, Sign};
pub use bigint::{BigInt, DIGIT_BITS, Digit, LimbInt, NumInt};
pub use error::NumError;
pub use text::is_inf_str;
