//! Wire format
//!
//! The Opatomic serialized-object ("SO") encoding: a tagged, self-delimiting
//! binary format for a dynamic value lattice (null, booleans, infinities,
//! arbitrary-precision integers and decimals, UTF-8 strings, binary blobs,
//! and nested arrays).
//!
//! # Components
//!
//! - [`varint`]: canonical LEB128 encoding of `u64`
//! - [`utf8`]: resumable byte-at-a-time UTF-8 validation
//! - [`Tag`]: the one-byte wire type tags
//! - [`Value`]: the in-memory value lattice
//! - [`encode_value`] / [`decode_value`] / [`so_len`]: the codec itself
//! - [`Framer`]: restartable state machine locating object boundaries in a
//!   byte stream, with well-formedness enforcement
//! - [`stringify`]: human-readable rendering of encoded values
//!
//! The codec trusts its input only as far as the framer has validated it;
//! everything returns `Result` and nothing panics on malformed bytes.

mod codec;
mod error;
mod framer;
mod stringify;
mod tag;
pub mod utf8;
mod value;
pub mod varint;

pub use codec::{decode_number, decode_value, encode_number, encode_value, so_len, str_or_bin};
pub use error::ProtocolError;
pub use framer::{Framer, FramerOptions};
pub use stringify::stringify;
pub use tag::Tag;
pub use value::Value;

pub use opatomic_num::{BigDec, BigInt, NumInt, Sign};

/// The concrete decimal type carried by [`Value::Num`].
pub type Number = BigDec<NumInt>;
