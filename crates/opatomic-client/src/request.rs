//! Request/response entity.
//!
//! A [`Request`] owns the serialized request bytes from the moment the
//! builder finishes until the client has written them out, and later owns
//! the serialized response delivered through
//! [`Handler::on_response`](crate::Handler::on_response). Status flags
//! mirror its lifecycle: queued, sent, response received, response is an
//! error.

use bytes::Bytes;
use opatomic_proto::{ProtocolError, so_len, str_or_bin, varint};

use crate::error::ClientError;

/// Request status flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ReqFlags(u8);

impl ReqFlags {
    pub(crate) const IS_ASYNC: u8 = 0x01;
    pub(crate) const NO_RESPONSE: u8 = 0x02;
    pub(crate) const QUEUED: u8 = 0x04;
    pub(crate) const SENT: u8 = 0x08;
    pub(crate) const RESPONSE_RECVD: u8 = 0x10;
    pub(crate) const RESPONSE_IS_ERR: u8 = 0x20;

    pub(crate) fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub(crate) fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }
}

/// A request and, eventually, its response.
///
/// Constructed by [`RequestBuilder::finish`](crate::RequestBuilder::finish)
/// or [`parse_user_command`](crate::parse_user_command), then moved into the
/// client with one of the `queue_*` calls. Ownership comes back through
/// `on_response` (with the response attached) or `req_err`.
#[derive(Debug)]
pub struct Request {
    /// Serialized request; drained once fully written.
    buf: Vec<u8>,
    /// Serialized response, once received.
    response: Option<Bytes>,
    /// Offset of the result-or-error value inside `response`.
    value_pos: usize,
    flags: ReqFlags,
    /// Assigned async id; zero when the request is not async.
    id: i64,
    /// Caller-owned correlation value, echoed through `on_sent`.
    context: u64,
}

impl Request {
    pub(crate) fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, response: None, value_pos: 0, flags: ReqFlags::default(), id: 0, context: 0 }
    }

    /// The serialized request bytes (empty once the request was sent).
    #[must_use]
    pub fn request_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Caller-owned correlation value.
    #[must_use]
    pub fn context(&self) -> u64 {
        self.context
    }

    /// Attach a correlation value; it is echoed through
    /// [`Handler::on_sent`](crate::Handler::on_sent).
    pub fn set_context(&mut self, context: u64) {
        self.context = context;
    }

    /// The async id assigned by [`Client::queue_async`](crate::Client::queue_async).
    /// Negative for persistent subscriptions, `None` for non-async requests.
    #[must_use]
    pub fn async_id(&self) -> Option<i64> {
        if self.flags.contains(ReqFlags::IS_ASYNC) { Some(self.id) } else { None }
    }

    /// `true` once the request bytes were fully written to the transport.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.flags.contains(ReqFlags::SENT)
    }

    /// `true` once a response has been received.
    #[must_use]
    pub fn response_received(&self) -> bool {
        self.flags.contains(ReqFlags::RESPONSE_RECVD)
    }

    /// Whether the received response is an error object; `None` until a
    /// response arrives.
    #[must_use]
    pub fn response_is_err(&self) -> Option<bool> {
        if self.response_received() {
            Some(self.flags.contains(ReqFlags::RESPONSE_IS_ERR))
        } else {
            None
        }
    }

    /// The serialized result value — or, when
    /// [`response_is_err`](Self::response_is_err) says so, the serialized
    /// error object. The value is self-delimiting; trailing response bytes
    /// after it belong to the enclosing response array.
    #[must_use]
    pub fn response(&self) -> Option<&[u8]> {
        self.response.as_ref().map(|bytes| &bytes[self.value_pos..])
    }

    /// Parse the error object of an error response.
    ///
    /// # Errors
    ///
    /// `NoResponse` before a response arrives, `NotAnError` for a success
    /// response, `Protocol` when the error object violates the wire
    /// contract.
    pub fn load_error(&self) -> Result<RpcError<'_>, ClientError> {
        match self.response_is_err() {
            None => Err(ClientError::NoResponse),
            Some(false) => Err(ClientError::NotAnError),
            Some(true) => {
                let buf = self.response().ok_or(ClientError::NoResponse)?;
                parse_rpc_error(buf).map_err(ClientError::from)
            },
        }
    }

    pub(crate) fn flags(&self) -> ReqFlags {
        self.flags
    }

    pub(crate) fn insert_flag(&mut self, flag: u8) {
        self.flags.insert(flag);
    }

    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    pub(crate) fn take_buf(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Rewrite the builder's `NULL` id placeholder to `FALSE`
    /// (fire-and-forget).
    pub(crate) fn set_id_slot_false(&mut self) -> Result<(), ()> {
        match self.buf.get_mut(1) {
            Some(slot) if *slot == b'N' => {
                *slot = b'F';
                Ok(())
            },
            _ => Err(()),
        }
    }

    /// Replace the builder's `NULL` id placeholder with a signed varint id.
    pub(crate) fn splice_async_id(&mut self, id: i64) -> Result<(), ()> {
        if self.buf.first() != Some(&b'[') || self.buf.get(1) != Some(&b'N') {
            return Err(());
        }
        let mut encoded = Vec::with_capacity(1 + varint::MAX_LEN);
        encoded.push(if id < 0 { b'E' } else { b'D' });
        varint::write(id.unsigned_abs(), &mut encoded);
        self.buf.splice(1..2, encoded);
        self.id = id;
        Ok(())
    }

    pub(crate) fn attach_response(&mut self, response: Bytes, value_pos: usize, is_err: bool) {
        self.response = Some(response);
        self.value_pos = value_pos;
        self.flags.insert(ReqFlags::RESPONSE_RECVD);
        if is_err {
            self.flags.insert(ReqFlags::RESPONSE_IS_ERR);
        }
    }

    /// A detached copy used to deliver one response of a persistent
    /// subscription while the original stays registered in the id map.
    pub(crate) fn delivery_copy(&self) -> Self {
        Self {
            buf: Vec::new(),
            response: None,
            value_pos: 0,
            flags: self.flags,
            id: self.id,
            context: self.context,
        }
    }
}

/// A normalized RPC error object, borrowing from the response buffer.
///
/// On the wire this is either a bare signed varint code or
/// `[code, message, data?]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcError<'a> {
    /// Signed error code (fits `i32` by contract).
    pub code: i32,
    /// Error message; `None` for the bare-code form.
    pub message: Option<&'a str>,
    /// Optional serialized detail value.
    pub data: Option<&'a [u8]>,
}

fn parse_code(buf: &[u8]) -> Result<(i32, usize), ProtocolError> {
    match buf.first() {
        Some(&b'D') => {
            let (magnitude, used) = varint::decode(&buf[1..])?;
            if magnitude > u64::from(i32::MAX as u32) {
                return Err(ProtocolError::Malformed("error code outside i32"));
            }
            Ok((magnitude as i32, 1 + used))
        },
        Some(&b'E') => {
            let (magnitude, used) = varint::decode(&buf[1..])?;
            if magnitude > u64::from(i32::MAX as u32) + 1 {
                return Err(ProtocolError::Malformed("error code outside i32"));
            }
            Ok(((-(magnitude as i64)) as i32, 1 + used))
        },
        _ => Err(ProtocolError::Malformed("error code must be a varint")),
    }
}

/// Validate and parse a serialized error object.
pub(crate) fn parse_rpc_error(buf: &[u8]) -> Result<RpcError<'_>, ProtocolError> {
    if buf.first() != Some(&b'[') {
        let (code, _) = parse_code(buf)?;
        return Ok(RpcError { code, message: None, data: None });
    }
    let mut i = 1usize;
    let (code, used) = parse_code(&buf[i..])?;
    i += used;
    let message = match buf.get(i) {
        Some(&b'S') => {
            let payload = str_or_bin(&buf[i..])?;
            let text =
                std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
            i += 1 + varint::encoded_len(payload.len() as u64) + payload.len();
            Some(text)
        },
        Some(&b'R') => {
            i += 1;
            Some("")
        },
        _ => return Err(ProtocolError::Malformed("error message must be a string")),
    };
    let data = if buf.get(i) == Some(&b']') {
        None
    } else {
        let len = so_len(&buf[i..])?;
        let slice = &buf[i..i + len];
        i += len;
        Some(slice)
    };
    if buf.get(i) != Some(&b']') {
        return Err(ProtocolError::Malformed("malformed error object"));
    }
    Ok(RpcError { code, message, data })
}
