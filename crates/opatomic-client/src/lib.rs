//! Client
//!
//! Sans-IO request/response multiplexer for the Opatomic protocol. The
//! [`Client`] never performs I/O itself: the caller supplies non-blocking
//! read/write callbacks through the [`Transport`] trait and receives
//! completions through the [`Handler`] trait.
//!
//! # Architecture
//!
//! Outgoing requests are built with [`RequestBuilder`] (or parsed from a
//! human-typed command line with [`parse_user_command`]), queued with one of
//! the `queue_*` entry points, and pushed onto the wire by
//! [`Client::send_requests`]. Incoming bytes are pulled and framed by
//! [`Client::parse_responses`], which pairs each response with its request:
//! in strict FIFO order for synchronous requests, by async-id for the rest.
//!
//! # Threading
//!
//! All entry points take `&self`. `send_requests` and `parse_responses` may
//! run concurrently on two threads; each guards its own state and turns
//! re-entrant calls (from inside callbacks) into no-ops. `queue_*` may be
//! called from any thread at any time. [`Client::close`] must only be called
//! once every other entry point has quiesced.

mod builder;
mod client;
mod command;
mod error;
mod idmap;
mod info;
mod queue;
mod request;

pub use builder::RequestBuilder;
pub use client::{Client, ClientOptions, Handler, Transport};
pub use command::parse_user_command;
pub use error::{BuildError, ClientError, ReqErrReason};
pub use idmap::IdMap;
pub use info::{BuildInfo, build_info};
pub use queue::Fifo;
pub use request::{Request, RpcError};
