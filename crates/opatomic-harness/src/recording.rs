//! Callback recorder for assertions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use opatomic_client::{ClientError, Handler, ReqErrReason, Request};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Handler`] that stores every callback it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    responses: Mutex<Vec<Request>>,
    sent: Mutex<Vec<u64>>,
    req_errs: Mutex<Vec<(u64, ReqErrReason)>>,
    client_errs: Mutex<Vec<ClientError>>,
    unknown: Mutex<Vec<Bytes>>,
}

impl RecordingHandler {
    /// A fresh, empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded responses.
    pub fn take_responses(&self) -> Vec<Request> {
        std::mem::take(&mut *lock(&self.responses))
    }

    /// Number of responses recorded so far.
    #[must_use]
    pub fn response_count(&self) -> usize {
        lock(&self.responses).len()
    }

    /// Contexts reported through `on_sent`, in order.
    #[must_use]
    pub fn sent_contexts(&self) -> Vec<u64> {
        lock(&self.sent).clone()
    }

    /// `(context, reason)` pairs reported through `req_err`, in order.
    #[must_use]
    pub fn req_errs(&self) -> Vec<(u64, ReqErrReason)> {
        lock(&self.req_errs).clone()
    }

    /// Fatal client errors, in order.
    #[must_use]
    pub fn client_errs(&self) -> Vec<ClientError> {
        lock(&self.client_errs).clone()
    }

    /// Responses dropped for carrying an unknown async id.
    #[must_use]
    pub fn unknown_responses(&self) -> Vec<Bytes> {
        lock(&self.unknown).clone()
    }
}

impl Handler for RecordingHandler {
    fn on_sent(&self, context: u64) {
        lock(&self.sent).push(context);
    }

    fn on_response(&self, request: Request) {
        lock(&self.responses).push(request);
    }

    fn client_err(&self, err: ClientError) {
        lock(&self.client_errs).push(err);
    }

    fn req_err(&self, request: Request, reason: ReqErrReason) {
        lock(&self.req_errs).push((request.context(), reason));
    }

    fn unknown_async_id(&self, response: Bytes) {
        lock(&self.unknown).push(response);
    }
}
