//! Streaming validator/framer.
//!
//! A restartable, byte-at-a-time state machine that consumes SO bytes from
//! a network stream, enforces well-formedness (including inline UTF-8
//! validation), and reports the byte offset just past each top-level
//! object. Feed it chunks of any size; when it returns `Ok(None)` the whole
//! chunk was consumed and more bytes are needed, and the internal state
//! resumes exactly where the stream left off.
//!
//! On-wire varints are capped at nine bytes here (values up to
//! `i64::MAX`); the standalone codec accepts the full ten-byte range.

use crate::error::ProtocolError;
use crate::tag::Tag;
use crate::utf8::{self, Utf8State};

/// Well-formedness limits applied while framing.
#[derive(Debug, Clone, Copy)]
pub struct FramerOptions {
    /// Maximum array nesting depth.
    pub max_array_depth: u32,
    /// Validate string payloads as UTF-8 while scanning.
    pub check_utf8: bool,
    /// Maximum byte count of a big-integer magnitude.
    pub max_bigint_len: u64,
    /// Maximum absolute value of a decimal exponent varint. The default
    /// (`i32::MAX`) rejects the single representable value `i32::MIN`;
    /// raise the limit by one to admit it.
    pub max_dec_exponent: u64,
}

impl Default for FramerOptions {
    fn default() -> Self {
        Self {
            max_array_depth: u32::MAX,
            check_utf8: true,
            max_bigint_len: u64::MAX,
            max_dec_exponent: i32::MAX as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Dispatch on the first byte of an object.
    NextObj,
    /// Continuing a multi-byte varint scan.
    Varint,
    /// Exponent varint done; validate it and read the significand varint.
    VarDec,
    /// Exponent varint done; validate it and read the bigint byte count.
    BigDec,
    /// Consume string bytes while validating UTF-8.
    Utf8,
    /// Consume raw bytes (binary blob or bigint magnitude).
    SkipBytes,
    /// Validate a bigint byte count and its leading magnitude byte.
    CheckBigIntBytes,
    /// A complete non-array object was scanned.
    ReturnObj,
    /// Sticky failure.
    Failed(ProtocolError),
}

/// Restartable end-of-object scanner. See the module docs.
#[derive(Debug)]
pub struct Framer {
    options: FramerOptions,
    state: State,
    utf8: Utf8State,
    varint_next: State,
    varint_len: u8,
    /// Varint accumulator, then repurposed as the remaining byte count in
    /// the `Utf8`/`SkipBytes` states.
    varint_val: u64,
    depth: u32,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramerOptions::default())
    }
}

impl Framer {
    /// A fresh framer with the given limits.
    #[must_use]
    pub fn new(options: FramerOptions) -> Self {
        Self {
            options,
            state: State::NextObj,
            utf8: Utf8State::Accept,
            varint_next: State::NextObj,
            varint_len: 0,
            varint_val: 0,
            depth: 0,
        }
    }

    /// Current array nesting depth.
    #[must_use]
    pub fn array_depth(&self) -> u32 {
        self.depth
    }

    /// `true` when the framer sits at a top-level object boundary.
    #[must_use]
    pub fn at_boundary(&self) -> bool {
        self.state == State::NextObj && self.depth == 0
    }

    fn fail<T>(&mut self, err: ProtocolError) -> Result<T, ProtocolError> {
        self.state = State::Failed(err);
        Err(err)
    }

    fn begin_varint(&mut self, next: State) {
        self.varint_len = 0;
        self.varint_val = 0;
        self.varint_next = next;
        self.state = State::Varint;
    }

    /// Scan `buf`. Returns `Ok(Some(end))` with `end` one past the final
    /// byte of the current top-level object (the bytes at `end..` belong to
    /// the next object and were not examined), or `Ok(None)` when the whole
    /// buffer was consumed without completing an object.
    ///
    /// # Errors
    ///
    /// The first well-formedness violation is returned and remembered;
    /// every later call fails with the same error without consuming input.
    pub fn find_end(&mut self, buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
        let mut i = 0usize;
        loop {
            match self.state {
                State::Failed(err) => return Err(err),

                State::NextObj => {
                    let Some(&byte) = buf.get(i) else { return Ok(None) };
                    i += 1;
                    let Ok(tag) = Tag::from_byte(byte) else {
                        return self.fail(ProtocolError::UnknownTag(byte));
                    };
                    match tag {
                        Tag::Undefined
                        | Tag::Null
                        | Tag::False
                        | Tag::True
                        | Tag::SortMax
                        | Tag::NegInf
                        | Tag::PosInf
                        | Tag::Zero
                        | Tag::BinEmpty
                        | Tag::StrEmpty
                        | Tag::ArrayEmpty => {
                            if self.depth == 0 {
                                return Ok(Some(i));
                            }
                        },
                        Tag::PosVarint | Tag::NegVarint => {
                            self.begin_varint(State::ReturnObj);
                        },
                        Tag::PosBigint | Tag::NegBigint => {
                            self.begin_varint(State::CheckBigIntBytes);
                        },
                        Tag::PosPosVardec
                        | Tag::PosNegVardec
                        | Tag::NegPosVardec
                        | Tag::NegNegVardec => {
                            self.begin_varint(State::VarDec);
                        },
                        Tag::PosPosBigdec
                        | Tag::PosNegBigdec
                        | Tag::NegPosBigdec
                        | Tag::NegNegBigdec => {
                            self.begin_varint(State::BigDec);
                        },
                        Tag::BinLpvi => {
                            self.begin_varint(State::SkipBytes);
                        },
                        Tag::StrLpvi => {
                            self.utf8 = Utf8State::Accept;
                            self.begin_varint(if self.options.check_utf8 {
                                State::Utf8
                            } else {
                                State::SkipBytes
                            });
                        },
                        Tag::ArrayStart => {
                            if self.depth >= self.options.max_array_depth {
                                return self.fail(ProtocolError::BadNesting);
                            }
                            self.depth += 1;
                        },
                        Tag::ArrayEnd => {
                            if self.depth == 0 {
                                return self.fail(ProtocolError::BadNesting);
                            }
                            self.depth -= 1;
                            if self.depth == 0 {
                                return Ok(Some(i));
                            }
                        },
                    }
                },

                State::Varint => {
                    let Some(&byte) = buf.get(i) else { return Ok(None) };
                    if byte & 0x80 != 0 && self.varint_len < 9 {
                        self.varint_val |=
                            u64::from(byte & 0x7F) << (u32::from(self.varint_len) * 7);
                        self.varint_len += 1;
                        i += 1;
                        continue;
                    }
                    // Wire varints take 1-9 bytes, and a multi-byte varint
                    // cannot end in a zero byte.
                    if self.varint_len >= 9 || (byte == 0 && self.varint_len > 0) {
                        return self.fail(ProtocolError::InvalidVarint);
                    }
                    self.varint_val |=
                        u64::from(byte & 0x7F) << (u32::from(self.varint_len) * 7);
                    i += 1;
                    self.state = self.varint_next;
                },

                State::VarDec => {
                    if self.varint_val > self.options.max_dec_exponent {
                        return self.fail(ProtocolError::ExponentRange);
                    }
                    self.begin_varint(State::ReturnObj);
                },

                State::BigDec => {
                    if self.varint_val > self.options.max_dec_exponent {
                        return self.fail(ProtocolError::ExponentRange);
                    }
                    self.begin_varint(State::CheckBigIntBytes);
                },

                State::CheckBigIntBytes => {
                    if self.varint_val == 0 || self.varint_val > self.options.max_bigint_len {
                        return self.fail(ProtocolError::BigIntLen);
                    }
                    let Some(&byte) = buf.get(i) else { return Ok(None) };
                    if byte == 0 && self.varint_val > 1 {
                        return self.fail(ProtocolError::BigIntLeadingZero);
                    }
                    self.state = State::SkipBytes;
                },

                State::SkipBytes => {
                    let available = (buf.len() - i) as u64;
                    if self.varint_val > available {
                        self.varint_val -= available;
                        return Ok(None);
                    }
                    i += self.varint_val as usize;
                    self.state = State::NextObj;
                    if self.depth == 0 {
                        return Ok(Some(i));
                    }
                },

                State::Utf8 => {
                    let available = (buf.len() - i) as u64;
                    let chunk = self.varint_val.min(available) as usize;
                    self.utf8 = utf8::validate_chunk(self.utf8, &buf[i..i + chunk]);
                    if self.utf8 == Utf8State::Reject {
                        return self.fail(ProtocolError::InvalidUtf8);
                    }
                    if (chunk as u64) < self.varint_val {
                        self.varint_val -= chunk as u64;
                        return Ok(None);
                    }
                    if self.utf8 != Utf8State::Accept {
                        // The string ended in the middle of a code point.
                        return self.fail(ProtocolError::InvalidUtf8);
                    }
                    i += chunk;
                    self.state = State::NextObj;
                    if self.depth == 0 {
                        return Ok(Some(i));
                    }
                },

                State::ReturnObj => {
                    self.state = State::NextObj;
                    if self.depth == 0 {
                        return Ok(Some(i));
                    }
                },
            }
        }
    }
}
