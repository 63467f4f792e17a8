//! Test harness
//!
//! Deterministic plumbing for exercising the client without sockets:
//!
//! - [`pipe`]: an in-memory duplex byte pipe with a configurable per-call
//!   I/O cap, so tests can force short reads and writes at any byte
//!   boundary
//! - [`SimServer`]: a scriptable protocol server that parses framed
//!   requests and replies only when the test tells it to, in any order
//! - [`RecordingHandler`]: a [`Handler`](opatomic_client::Handler) that
//!   records every callback for assertions

mod pipe;
mod recording;
mod sim_server;

pub use pipe::{PipeEnd, pair};
pub use recording::RecordingHandler;
pub use sim_server::{ServerRequest, SimServer};
