//! Wire-level error type.
//!
//! Every variant is a flavor of "the bytes are malformed" — the split exists
//! so diagnostics can say which rule was broken. The framer and the decoder
//! share this type.

use thiserror::Error;

/// Errors raised while validating or decoding SO bytes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A varint was non-canonical: zero final byte on a multi-byte
    /// encoding, or bits set above bit 63.
    #[error("invalid varint encoding")]
    InvalidVarint,

    /// The buffer ended inside an object.
    #[error("truncated object")]
    Truncated,

    /// The first byte of an object is not a known type tag.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// String bytes are not valid UTF-8.
    #[error("invalid utf-8 in string")]
    InvalidUtf8,

    /// Array nesting exceeded the configured limit, or an `ARRAY_END`
    /// appeared with no open array.
    #[error("array nesting out of balance or too deep")]
    BadNesting,

    /// A big-integer byte count was zero or exceeded the configured limit.
    #[error("big integer byte count out of bounds")]
    BigIntLen,

    /// A big-integer magnitude longer than one byte started with a zero
    /// byte (magnitudes must be minimal).
    #[error("big integer magnitude has a leading zero byte")]
    BigIntLeadingZero,

    /// A decimal exponent magnitude exceeded the configured or
    /// representable bound.
    #[error("decimal exponent out of bounds")]
    ExponentRange,

    /// A structural rule was violated (the message names it).
    #[error("malformed object: {0}")]
    Malformed(&'static str),
}
