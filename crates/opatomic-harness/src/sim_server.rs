//! Scriptable simulation server.
//!
//! Parses framed requests off its pipe end and leaves response timing and
//! ordering to the test: call [`SimServer::respond`] (or
//! [`SimServer::respond_err`]) with any parsed request, in any order, as
//! many times as the scenario needs. [`SimServer::auto_reply`] implements
//! the tiny command set most tests use (`PING`, `ECHO`).

use opatomic_client::Transport;
use opatomic_proto::{Framer, Value, decode_value, encode_value, so_len};

use crate::pipe::PipeEnd;

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    /// Raw SO bytes of the async-id slot, echoed verbatim into responses.
    pub id_bytes: Vec<u8>,
    /// Command name.
    pub command: String,
    /// Decoded argument values.
    pub args: Vec<Value>,
    /// `false` for fire-and-forget requests (id slot is `FALSE`).
    pub expects_response: bool,
}

impl ServerRequest {
    fn is_async(&self) -> bool {
        matches!(self.id_bytes.first(), Some(&b'D' | &b'E'))
    }
}

/// Minimal in-process Opatomic server for tests.
#[derive(Debug)]
pub struct SimServer {
    io: PipeEnd,
    framer: Framer,
    pending: Vec<u8>,
}

impl SimServer {
    /// A server speaking over the given pipe end.
    #[must_use]
    pub fn new(io: PipeEnd) -> Self {
        Self { io, framer: Framer::default(), pending: Vec::new() }
    }

    /// Read whatever bytes are available and return every completed
    /// request, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics on malformed input; tests feed the server through the real
    /// client, so malformed requests are test bugs.
    #[allow(clippy::panic)] // test harness: malformed traffic is a test bug
    pub fn poll_requests(&mut self) -> Vec<ServerRequest> {
        let mut requests = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let count = self.io.read(&mut buf);
            if count == 0 {
                break;
            }
            let mut chunk = &buf[..count];
            loop {
                match self.framer.find_end(chunk) {
                    Err(err) => panic!("malformed request from client: {err}"),
                    Ok(None) => {
                        self.pending.extend_from_slice(chunk);
                        break;
                    },
                    Ok(Some(end)) => {
                        self.pending.extend_from_slice(&chunk[..end]);
                        let raw = std::mem::take(&mut self.pending);
                        requests.push(parse_request(&raw));
                        chunk = &chunk[end..];
                        if chunk.is_empty() {
                            break;
                        }
                    },
                }
            }
        }
        requests
    }

    fn write_all(&self, bytes: &[u8]) {
        let mut pos = 0usize;
        while pos < bytes.len() {
            let written = self.io.write(&bytes[pos..]);
            assert!(written > 0, "pipe refused bytes");
            pos += written;
        }
    }

    /// Send a success response `[result, null, id?]` for `request`.
    pub fn respond(&mut self, request: &ServerRequest, result: &Value) {
        let mut out = vec![b'['];
        encode_value(result, &mut out);
        out.push(b'N');
        if request.is_async() {
            out.extend_from_slice(&request.id_bytes);
        }
        out.push(b']');
        self.write_all(&out);
    }

    /// Send an error response `[null, [code, message], id?]` for `request`.
    pub fn respond_err(&mut self, request: &ServerRequest, code: i32, message: &str) {
        let error = Value::Array(vec![Value::from(i64::from(code)), Value::from(message)]);
        let mut out = vec![b'[', b'N'];
        encode_value(&error, &mut out);
        if request.is_async() {
            out.extend_from_slice(&request.id_bytes);
        }
        out.push(b']');
        self.write_all(&out);
    }

    /// Send raw response bytes, bypassing all shaping. For tests that
    /// probe the client's response validation.
    pub fn respond_raw(&mut self, bytes: &[u8]) {
        self.write_all(bytes);
    }

    /// Poll and answer every pending request with the built-in command
    /// set: `PING` returns `"pong"`, `ECHO` returns its args array, and
    /// anything else an error. Fire-and-forget requests are dropped.
    /// Returns the handled requests.
    pub fn auto_reply(&mut self) -> Vec<ServerRequest> {
        let requests = self.poll_requests();
        for request in &requests {
            if !request.expects_response {
                tracing::debug!(command = %request.command, "dropping fire-and-forget request");
                continue;
            }
            match request.command.as_str() {
                "PING" => self.respond(request, &Value::from("pong")),
                "ECHO" => {
                    let echo = Value::Array(request.args.clone());
                    self.respond(request, &echo);
                },
                _ => self.respond_err(request, -1, "unknown command"),
            }
        }
        requests
    }
}

/// Split a framed request `[id, command, [args...]]` into its parts.
#[allow(clippy::panic, clippy::expect_used)] // test harness: malformed traffic is a test bug
fn parse_request(raw: &[u8]) -> ServerRequest {
    assert_eq!(raw.first(), Some(&b'['), "request must be an array");
    let mut i = 1usize;
    let id_len = so_len(&raw[i..]).expect("well-formed id");
    let id_bytes = raw[i..i + id_len].to_vec();
    i += id_len;

    let (command, used) = decode_value(&raw[i..]).expect("well-formed command");
    let Value::Str(command) = command else { panic!("command must be a string") };
    i += used;

    let args = if raw.get(i) == Some(&b']') {
        Vec::new()
    } else {
        let (args, _) = decode_value(&raw[i..]).expect("well-formed args");
        match args {
            Value::Array(items) => items,
            other => panic!("args must be an array, got {other:?}"),
        }
    };

    let expects_response = id_bytes != [b'F'];
    ServerRequest { id_bytes, command, args, expects_response }
}
