//! Error type for the numeric engine.
//!
//! One enum for both the integer capability and the decimal engine. The
//! original taxonomy also had an out-of-memory class; Rust's allocator
//! aborts instead, so it has no representation here.

use thiserror::Error;

/// Errors produced by big-integer and big-decimal operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumError {
    /// An argument was outside the supported domain (zero divisor digit,
    /// unsupported radix).
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),

    /// A bound was exceeded: exponent outside `i32`, a value that does not
    /// fit 64 bits, or an exact integer conversion that would lose
    /// precision.
    #[error("overflow: {0}")]
    Overflow(&'static str),

    /// Text input did not match the numeric grammar.
    #[error("parse error: {0}")]
    Parse(&'static str),
}
