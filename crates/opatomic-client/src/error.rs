//! Client-side error types.
//!
//! [`BuildError`] covers request construction (builder misuse, bad numeric
//! or command-line input). [`ClientError`] covers the running client (wire
//! violations, lifecycle). [`ReqErrReason`] explains why an individual
//! request will never complete; it is delivered through
//! [`Handler::req_err`](crate::Handler::req_err) together with the request
//! itself.

use opatomic_num::NumError;
use opatomic_proto::ProtocolError;
use thiserror::Error;

/// Errors raised while assembling a request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The builder was driven through an illegal sequence of calls.
    #[error("invalid request builder state: {0}")]
    InvalidState(&'static str),

    /// Command-line input could not be parsed (the message names the rule).
    #[error("parse error: {0}")]
    Parse(&'static str),

    /// A numeric argument was rejected by the decimal engine.
    #[error(transparent)]
    Num(#[from] NumError),
}

/// Fatal and lifecycle errors of the client itself.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// The server sent bytes that violate the wire contract.
    #[error("wire protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A response arrived with no request waiting for it.
    #[error("received a response with no matching request")]
    ExtraResponse,

    /// The client is closed (or failed earlier) and accepts no more work.
    #[error("client is closed")]
    Closed,

    /// A response has not been received yet.
    #[error("a response has not been received")]
    NoResponse,

    /// The received response is a result, not an error object.
    #[error("the response is not an error")]
    NotAnError,
}

/// Why a queued request will never receive its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqErrReason {
    /// The request bytes fail the wire-shape checks for their mode.
    InvalidRequest,

    /// The async id is already tracked (internal error, should not happen).
    IdExists,

    /// An error occurred while preparing the request.
    Failed(ClientError),

    /// The client closed or failed before the response arrived.
    Closed,
}
