//! The client core.
//!
//! An I/O-agnostic state machine: a FIFO of requests waiting to be sent, a
//! slot for a partially-written request, a FIFO of synchronous requests
//! awaiting their strictly-ordered responses, an id map of async requests,
//! and a streaming framer accumulating the current response.
//!
//! A request enters its tracking structure *before* any of its bytes are
//! written; with separate send and receive threads the response could
//! otherwise arrive while the sender is still mid-write.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use opatomic_proto::{Framer, FramerOptions, ProtocolError, so_len, varint};

use crate::error::{ClientError, ReqErrReason};
use crate::idmap::IdMap;
use crate::queue::Fifo;
use crate::request::{ReqFlags, Request};

/// Bytes pulled from the transport per `parse_responses` call.
const DEFAULT_READ_LEN: usize = 8 * 1024;

/// Non-blocking byte transport supplied by the caller.
///
/// Both calls return the number of bytes moved; `0` means would-block,
/// closed, or error, and makes the client return to its caller.
pub trait Transport {
    /// Try to fill `buf`, returning the number of bytes read.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Try to drain `buf`, returning the number of bytes written.
    fn write(&self, buf: &[u8]) -> usize;
}

/// Completion callbacks supplied by the caller.
///
/// Callbacks run on whichever thread drives the corresponding entry point.
/// Calling back into the same entry point from a callback is a no-op, not a
/// deadlock; calling [`Client::close`] from a callback is forbidden.
pub trait Handler {
    /// The request with the given context value was fully written and its
    /// buffer released.
    fn on_sent(&self, _context: u64) {}

    /// A response arrived. The request is handed back with the response
    /// attached; dropping it frees both.
    fn on_response(&self, request: Request);

    /// The client hit a fatal error and will refuse further work.
    fn client_err(&self, _err: ClientError) {}

    /// The request will never complete. Dropping it frees its buffers.
    fn req_err(&self, request: Request, reason: ReqErrReason) {
        let _ = (request, reason);
    }

    /// A response carried an async id the client never issued. The default
    /// logs and drops it.
    fn unknown_async_id(&self, response: Bytes) {
        match opatomic_proto::stringify(&response, None) {
            Ok(text) => tracing::warn!(response = %text, "dropping response with unknown async id"),
            Err(err) => tracing::warn!(%err, "dropping unparsable response with unknown async id"),
        }
    }
}

/// Client tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Read batch size for [`Client::parse_responses`].
    pub read_len: usize,
    /// Well-formedness limits for the response framer.
    pub framer: FramerOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { read_len: DEFAULT_READ_LEN, framer: FramerOptions::default() }
    }
}

/// A request being written to the transport.
#[derive(Debug)]
struct SendBuf {
    bytes: Vec<u8>,
    pos: usize,
    context: u64,
    /// Fire-and-forget requests are not tracked anywhere else, so the
    /// request object rides along until the write completes.
    noresp_request: Option<Request>,
}

#[derive(Debug, Default)]
struct SendState {
    current: Option<SendBuf>,
}

#[derive(Debug)]
struct RecvState {
    framer: Framer,
    response: BytesMut,
}

/// The request/response multiplexer. See the crate docs for the lifecycle.
pub struct Client<T: Transport, H: Handler> {
    io: T,
    handler: H,
    options: ClientOptions,
    closed: AtomicBool,
    failed: Mutex<Option<ClientError>>,
    next_id: AtomicI64,
    to_send: Mutex<Fifo<Request>>,
    send: Mutex<SendState>,
    main_reqs: Mutex<Fifo<Request>>,
    async_reqs: Mutex<IdMap<Request>>,
    recv: Mutex<RecvState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport, H: Handler> Client<T, H> {
    /// A client over the given transport and callbacks, with default
    /// options.
    pub fn new(io: T, handler: H) -> Self {
        Self::with_options(io, handler, ClientOptions::default())
    }

    /// A client with explicit options.
    pub fn with_options(io: T, handler: H, options: ClientOptions) -> Self {
        Self {
            io,
            handler,
            options,
            closed: AtomicBool::new(false),
            failed: Mutex::new(None),
            next_id: AtomicI64::new(0),
            to_send: Mutex::new(Fifo::new()),
            send: Mutex::new(SendState::default()),
            main_reqs: Mutex::new(Fifo::new()),
            async_reqs: Mutex::new(IdMap::new()),
            recv: Mutex::new(RecvState {
                framer: Framer::new(options.framer),
                response: BytesMut::new(),
            }),
        }
    }

    /// The caller's transport.
    pub fn transport(&self) -> &T {
        &self.io
    }

    /// The caller's handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// `false` once the client is closed or has hit a fatal error.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && lock(&self.failed).is_none()
    }

    /// The fatal error that stopped the client, if any.
    pub fn last_error(&self) -> Option<ClientError> {
        *lock(&self.failed)
    }

    fn fail(&self, err: ClientError) {
        {
            let mut failed = lock(&self.failed);
            if failed.is_some() {
                return;
            }
            *failed = Some(err);
        }
        self.handler.client_err(err);
    }

    fn handle_req_err(&self, request: Request, reason: ReqErrReason) {
        self.handler.req_err(request, reason);
    }

    /// Queue a synchronous, response-expecting request (the id slot stays
    /// `NULL`). Sent on the next [`send_requests`](Self::send_requests).
    pub fn queue_request(&self, request: Request) {
        self.queue_internal(request);
    }

    /// Queue a fire-and-forget request: the id slot is rewritten to
    /// `FALSE` and no response will ever be delivered for it.
    pub fn queue_no_response(&self, mut request: Request) {
        if request.set_id_slot_false().is_err() {
            let err = ClientError::Protocol(ProtocolError::Malformed(
                "request has no async-id placeholder",
            ));
            self.handle_req_err(request, ReqErrReason::Failed(err));
            return;
        }
        request.insert_flag(ReqFlags::NO_RESPONSE);
        self.queue_internal(request);
    }

    /// Queue an async request and return its assigned id: positive for a
    /// one-shot request (removed from tracking when its response arrives),
    /// negative for a persistent subscription (stays tracked until
    /// [`remove_persistent`](Self::remove_persistent)).
    pub fn queue_async(&self, mut request: Request, persistent: bool) -> i64 {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = if persistent { -seq } else { seq };
        if request.splice_async_id(id).is_err() {
            let err = ClientError::Protocol(ProtocolError::Malformed(
                "request has no async-id placeholder",
            ));
            self.handle_req_err(request, ReqErrReason::Failed(err));
            return id;
        }
        request.insert_flag(ReqFlags::IS_ASYNC);
        self.queue_internal(request);
        id
    }

    fn queue_internal(&self, mut request: Request) {
        request.insert_flag(ReqFlags::QUEUED);
        if !self.is_open() {
            self.handle_req_err(request, ReqErrReason::Closed);
            return;
        }
        lock(&self.to_send).push(request);
    }

    /// Unregister a persistent subscription, regaining ownership of its
    /// pending request. `None` when the id is unknown.
    pub fn remove_persistent(&self, id: i64) -> Option<Request> {
        lock(&self.async_reqs).remove(id)
    }

    /// Wire-shape check before transmission: array brackets plus the id
    /// slot matching the request mode.
    fn validate_for_send(request: &Request) -> bool {
        let buf = request.request_bytes();
        if buf.len() < 4 || buf.first() != Some(&b'[') || buf.last() != Some(&b']') {
            return false;
        }
        let slot = buf[1];
        if request.flags().contains(ReqFlags::IS_ASYNC) {
            slot == b'D' || slot == b'E'
        } else if request.flags().contains(ReqFlags::NO_RESPONSE) {
            slot == b'F'
        } else {
            slot == b'N'
        }
    }

    /// Pull the next sendable request off the queue, registering it with
    /// its tracking structure before any byte of it is written.
    fn next_queued(&self) -> Option<SendBuf> {
        loop {
            let mut request = lock(&self.to_send).poll()?;
            if !Self::validate_for_send(&request) {
                self.handle_req_err(request, ReqErrReason::InvalidRequest);
                continue;
            }
            let context = request.context();
            if request.flags().contains(ReqFlags::NO_RESPONSE) {
                let bytes = request.take_buf();
                return Some(SendBuf { bytes, pos: 0, context, noresp_request: Some(request) });
            }
            let bytes = request.take_buf();
            request.insert_flag(ReqFlags::SENT);
            if request.flags().contains(ReqFlags::IS_ASYNC) {
                let id = request.id();
                let rejected = lock(&self.async_reqs).insert(id, request);
                if let Err(request) = rejected {
                    self.handle_req_err(request, ReqErrReason::IdExists);
                    continue;
                }
            } else {
                lock(&self.main_reqs).push(request);
            }
            return Some(SendBuf { bytes, pos: 0, context, noresp_request: None });
        }
    }

    /// Try to send queued requests, resuming a partially-written one first.
    /// Returns when the write callback reports zero bytes or the queue is
    /// empty. A no-op when another thread is already sending.
    pub fn send_requests(&self) {
        if !self.is_open() {
            return;
        }
        let Ok(mut send) = self.send.try_lock() else { return };
        loop {
            let mut current = match send.current.take() {
                Some(current) => current,
                None => match self.next_queued() {
                    Some(current) => current,
                    None => return,
                },
            };
            while current.pos < current.bytes.len() {
                let written = self.io.write(&current.bytes[current.pos..]);
                if written == 0 {
                    send.current = Some(current);
                    return;
                }
                current.pos += written;
            }
            if let Some(mut request) = current.noresp_request.take() {
                request.insert_flag(ReqFlags::SENT);
            }
            self.handler.on_sent(current.context);
        }
    }

    /// Try to read and dispatch responses. Reads one batch of at most
    /// `read_len` bytes, frames it, and fires `on_response` for every
    /// completed response. Returns when the read callback reports zero
    /// bytes. A no-op when another thread is already receiving.
    pub fn parse_responses(&self) {
        if !self.is_open() {
            return;
        }
        let Ok(mut recv) = self.recv.try_lock() else { return };
        let mut buf = vec![0u8; self.options.read_len];
        let count = self.io.read(&mut buf);
        if count == 0 {
            return;
        }
        let mut chunk = &buf[..count];
        loop {
            match recv.framer.find_end(chunk) {
                Err(err) => {
                    self.fail(ClientError::Protocol(err));
                    return;
                },
                Ok(None) => {
                    recv.response.extend_from_slice(chunk);
                    return;
                },
                Ok(Some(end)) => {
                    recv.response.extend_from_slice(&chunk[..end]);
                    let response = recv.response.split().freeze();
                    if let Err(err) = self.dispatch_response(response) {
                        self.fail(err);
                        return;
                    }
                    chunk = &chunk[end..];
                    if chunk.is_empty() {
                        return;
                    }
                },
            }
        }
    }

    /// Validate a framed response and route it to its request.
    ///
    /// Shape: `[result, err?, async_id?]` with exactly one of result/err
    /// carrying data. Ids resolve against the async map (one-shot ids are
    /// removed, persistent ids stay); responses without an id pair with
    /// the head of the synchronous FIFO.
    fn dispatch_response(&self, response: Bytes) -> Result<(), ClientError> {
        let buf: &[u8] = &response;
        if buf.first() != Some(&b'[') {
            return Err(ClientError::Protocol(ProtocolError::Malformed(
                "response must be an array",
            )));
        }
        let result_pos = 1usize;
        let mut i = result_pos + so_len(&buf[result_pos..]).map_err(ClientError::Protocol)?;
        let mut err_pos = None;
        let mut id_pos = None;
        if buf.get(i) != Some(&b']') {
            err_pos = Some(i);
            i += so_len(&buf[i..]).map_err(ClientError::Protocol)?;
            if buf.get(i) != Some(&b']') {
                id_pos = Some(i);
                i += so_len(&buf[i..]).map_err(ClientError::Protocol)?;
                if buf.get(i) != Some(&b']') {
                    return Err(ClientError::Protocol(
                        ProtocolError::Malformed("response array too long"),
                    ));
                }
            }
        }

        let (value_pos, is_err) = match err_pos {
            Some(pos) if buf[pos] != b'N' => {
                if buf[result_pos] != b'N' {
                    return Err(ClientError::Protocol(
                        ProtocolError::Malformed(
                            "result or err must be null",
                        ),
                    ));
                }
                (pos, true)
            },
            _ => (result_pos, false),
        };
        if let Some(pos) = id_pos {
            if buf[pos] == b'N' {
                return Err(ClientError::Protocol(
                    ProtocolError::Malformed("async id cannot be null"),
                ));
            }
        }
        if is_err {
            // Reject responses whose error object violates the contract.
            crate::request::parse_rpc_error(&buf[value_pos..])
                .map_err(ClientError::Protocol)?;
        }

        let request = match id_pos {
            None => match lock(&self.main_reqs).poll() {
                Some(request) => Some(request),
                None => {
                    tracing::error!("received a response with no request pending");
                    return Err(ClientError::ExtraResponse);
                },
            },
            Some(pos) => {
                let found = match buf[pos] {
                    b'D' => match varint::decode(&buf[pos + 1..]) {
                        Ok((id, _)) if id <= i64::MAX as u64 => {
                            lock(&self.async_reqs).remove(id as i64)
                        },
                        _ => None,
                    },
                    b'E' => match varint::decode(&buf[pos + 1..]) {
                        Ok((id, _)) if id <= i64::MAX as u64 => {
                            lock(&self.async_reqs).get(-(id as i64)).map(Request::delivery_copy)
                        },
                        _ => None,
                    },
                    // The server must echo the id bytes verbatim; ids the
                    // client never issues cannot match anything.
                    _ => None,
                };
                match found {
                    Some(request) => Some(request),
                    None => {
                        self.handler.unknown_async_id(response.clone());
                        None
                    },
                }
            },
        };

        if let Some(mut request) = request {
            request.attach_response(response, value_pos, is_err);
            self.handler.on_response(request);
        }
        Ok(())
    }

    /// Close the client. Every request still queued or awaiting a response
    /// receives exactly one `req_err(Closed)`; later `queue_*` calls do
    /// too. Must only be called after all other entry points have
    /// quiesced, and never from inside a callback.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("closing client, draining pending requests");

        let partial = lock(&self.send).current.take();
        if let Some(mut current) = partial {
            if let Some(request) = current.noresp_request.take() {
                self.handle_req_err(request, ReqErrReason::Closed);
            }
        }

        loop {
            let next = lock(&self.to_send).poll();
            match next {
                Some(request) => self.handle_req_err(request, ReqErrReason::Closed),
                None => break,
            }
        }
        loop {
            let next = lock(&self.main_reqs).poll();
            match next {
                Some(request) => self.handle_req_err(request, ReqErrReason::Closed),
                None => break,
            }
        }
        let pending: Vec<Request> = {
            let mut map = lock(&self.async_reqs);
            map.drain().map(|(_, request)| request).collect()
        };
        for request in pending {
            self.handle_req_err(request, ReqErrReason::Closed);
        }

        let mut recv = lock(&self.recv);
        recv.response.clear();
    }
}
