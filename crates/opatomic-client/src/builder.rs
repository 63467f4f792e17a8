//! Incremental request builder.
//!
//! Assembles the wire shape `[async_id, command, [args...]]`. The builder
//! writes a one-byte `NULL` id placeholder that the client rewrites at
//! queue time (to `FALSE` for fire-and-forget, to a signed varint for
//! async requests). The first added element is the command; the args array
//! opens automatically before the second element and closes in
//! [`finish`](RequestBuilder::finish) (a request with no args gets the
//! empty-array tag, so `PING` serializes as `[null, "PING", []]`).
//!
//! Errors are sticky: the first failure is remembered and every later call
//! is a no-op until `finish` reports it.

use opatomic_proto::{Number, Tag, encode_number, so_len, varint};

use crate::error::BuildError;
use crate::request::Request;

/// Builder for a single request. See the module docs for the calling
/// contract.
#[derive(Debug)]
pub struct RequestBuilder {
    buf: Vec<u8>,
    depth: u32,
    wrote_command: bool,
    args_open: bool,
    err: Option<BuildError>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Start a request: `ARRAY_START` plus the `NULL` async-id placeholder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![Tag::ArrayStart.to_byte(), Tag::Null.to_byte()],
            depth: 0,
            wrote_command: false,
            args_open: false,
            err: None,
        }
    }

    fn set_err(&mut self, err: BuildError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Bookkeeping before an element is appended: the first element is the
    /// command, every later top-level element opens the args array.
    fn element(&mut self) {
        if !self.wrote_command {
            self.wrote_command = true;
        } else if !self.args_open {
            self.buf.push(Tag::ArrayStart.to_byte());
            self.args_open = true;
        }
    }

    fn push_str_or_bin(&mut self, tag: Tag, empty: Tag, payload: &[u8]) {
        if self.err.is_some() {
            return;
        }
        self.element();
        if payload.is_empty() {
            self.buf.push(empty.to_byte());
        } else {
            self.buf.push(tag.to_byte());
            varint::write(payload.len() as u64, &mut self.buf);
            self.buf.extend_from_slice(payload);
        }
    }

    /// Append a UTF-8 string.
    pub fn add_str(&mut self, value: &str) {
        self.push_str_or_bin(Tag::StrLpvi, Tag::StrEmpty, value.as_bytes());
    }

    /// Append a binary blob.
    pub fn add_bin(&mut self, value: &[u8]) {
        self.push_str_or_bin(Tag::BinLpvi, Tag::BinEmpty, value);
    }

    fn add_varint(&mut self, tag: Tag, magnitude: u64) {
        if self.err.is_some() {
            return;
        }
        self.element();
        if magnitude == 0 {
            self.buf.push(Tag::Zero.to_byte());
        } else if magnitude <= i64::MAX as u64 {
            self.buf.push(tag.to_byte());
            varint::write(magnitude, &mut self.buf);
        } else {
            // Too big for the varint form; fall through to bigint.
            let number = Number::from_u64(magnitude, tag == Tag::NegVarint, 0);
            encode_number(&number, &mut self.buf);
        }
    }

    /// Append a signed integer.
    pub fn add_i64(&mut self, value: i64) {
        if value < 0 {
            self.add_varint(Tag::NegVarint, value.unsigned_abs());
        } else {
            self.add_varint(Tag::PosVarint, value as u64);
        }
    }

    /// Append an unsigned integer.
    pub fn add_u64(&mut self, value: u64) {
        self.add_varint(Tag::PosVarint, value);
    }

    /// Append an arbitrary-precision decimal in its canonical wire form.
    pub fn add_number(&mut self, value: &Number) {
        if self.err.is_some() {
            return;
        }
        self.element();
        encode_number(value, &mut self.buf);
    }

    /// Parse a base-10 number string and append its canonical wire form.
    /// `"-0"` keeps its sign on the wire as a negative varint zero.
    pub fn add_num_str(&mut self, value: &str) {
        if self.err.is_some() {
            return;
        }
        match Number::from_str_radix(value, 10) {
            Err(err) => self.set_err(BuildError::Num(err)),
            Ok(number) => {
                self.element();
                if number.is_zero() && value.starts_with('-') {
                    self.buf.push(Tag::NegVarint.to_byte());
                    varint::write(0, &mut self.buf);
                } else {
                    encode_number(&number, &mut self.buf);
                }
            },
        }
    }

    /// Append an already-encoded SO value.
    pub fn add_so(&mut self, so: &[u8]) {
        if self.err.is_some() {
            return;
        }
        match so_len(so) {
            Err(_) => self.set_err(BuildError::InvalidState("malformed serialized value")),
            Ok(len) => {
                self.element();
                self.buf.extend_from_slice(&so[..len]);
            },
        }
    }

    /// Open a nested array.
    pub fn start_array(&mut self) {
        if self.err.is_some() {
            return;
        }
        self.element();
        self.buf.push(Tag::ArrayStart.to_byte());
        self.depth += 1;
    }

    /// Close the innermost nested array. A just-opened array collapses to
    /// the empty-array tag.
    pub fn stop_array(&mut self) {
        if self.err.is_some() {
            return;
        }
        if self.depth == 0 {
            self.set_err(BuildError::InvalidState("invalid array depth"));
            return;
        }
        if self.buf.last() == Some(&Tag::ArrayStart.to_byte()) {
            if let Some(last) = self.buf.last_mut() {
                *last = Tag::ArrayEmpty.to_byte();
            }
        } else {
            self.buf.push(Tag::ArrayEnd.to_byte());
        }
        self.depth -= 1;
    }

    /// Close the args array and the request, yielding the [`Request`].
    ///
    /// # Errors
    ///
    /// The first sticky error, `InvalidState("invalid array depth")` for
    /// unbalanced nesting, or `InvalidState("empty request")` when no
    /// command was added.
    pub fn finish(mut self) -> Result<Request, BuildError> {
        if let Some(err) = self.err {
            return Err(err);
        }
        if self.depth != 0 {
            return Err(BuildError::InvalidState("invalid array depth"));
        }
        if !self.wrote_command {
            return Err(BuildError::InvalidState("empty request"));
        }
        if self.args_open {
            self.buf.push(Tag::ArrayEnd.to_byte());
        } else {
            self.buf.push(Tag::ArrayEmpty.to_byte());
        }
        self.buf.push(Tag::ArrayEnd.to_byte());
        Ok(Request::from_bytes(self.buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(builder: RequestBuilder) -> Vec<u8> {
        builder.finish().expect("valid request").request_bytes().to_vec()
    }

    #[test]
    fn command_only_gets_empty_args() {
        let mut b = RequestBuilder::new();
        b.add_str("PING");
        assert_eq!(bytes(b), b"[NS\x04PINGM]");
    }

    #[test]
    fn args_array_opens_on_second_element() {
        let mut b = RequestBuilder::new();
        b.add_str("ECHO");
        b.add_str("hi");
        b.add_i64(-5);
        assert_eq!(bytes(b), b"[NS\x04ECHO[S\x02hiE\x05]]");
    }

    #[test]
    fn numeric_routing() {
        let mut b = RequestBuilder::new();
        b.add_str("N");
        b.add_i64(0);
        b.add_u64(u64::MAX);
        b.add_num_str("-0");
        b.add_num_str("1.25e-3");
        assert_eq!(
            bytes(b),
            b"[NS\x01N[OK\x08\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFFE\x00I\x05\x7D]]"
        );
    }

    #[test]
    fn nested_arrays_and_elision() {
        let mut b = RequestBuilder::new();
        b.add_str("CMD");
        b.start_array();
        b.add_str("x");
        b.start_array();
        b.stop_array();
        b.stop_array();
        assert_eq!(bytes(b), b"[NS\x03CMD[[S\x01xM]]]");
    }

    #[test]
    fn unbalanced_arrays_fail_at_finish() {
        let mut b = RequestBuilder::new();
        b.add_str("CMD");
        b.start_array();
        assert_eq!(
            b.finish().map(|_| ()),
            Err(BuildError::InvalidState("invalid array depth"))
        );

        let mut b = RequestBuilder::new();
        b.add_str("CMD");
        b.stop_array();
        assert_eq!(
            b.finish().map(|_| ()),
            Err(BuildError::InvalidState("invalid array depth"))
        );
    }

    #[test]
    fn empty_request_fails() {
        let b = RequestBuilder::new();
        assert_eq!(b.finish().map(|_| ()), Err(BuildError::InvalidState("empty request")));
    }

    #[test]
    fn errors_are_sticky() {
        let mut b = RequestBuilder::new();
        b.add_str("CMD");
        b.add_num_str("not-a-number");
        b.add_str("ignored");
        assert!(matches!(b.finish(), Err(BuildError::Num(_))));
    }
}
