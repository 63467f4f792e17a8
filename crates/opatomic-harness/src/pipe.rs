//! In-memory duplex byte pipe.
//!
//! Two [`PipeEnd`]s share a pair of byte queues. Each end caps how many
//! bytes a single `read`/`write` call may move; tests lower the cap to
//! exercise the client's short-write resume path and the framer's
//! chunk-boundary handling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opatomic_client::Transport;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One side of an in-memory duplex pipe.
#[derive(Debug, Clone)]
pub struct PipeEnd {
    incoming: Arc<Mutex<VecDeque<u8>>>,
    outgoing: Arc<Mutex<VecDeque<u8>>>,
    max_io: Arc<AtomicUsize>,
    write_budget: Arc<AtomicUsize>,
}

/// A connected pair of pipe ends (client side, server side).
#[must_use]
pub fn pair() -> (PipeEnd, PipeEnd) {
    let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
    let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
    let a = PipeEnd {
        incoming: Arc::clone(&b_to_a),
        outgoing: Arc::clone(&a_to_b),
        max_io: Arc::new(AtomicUsize::new(usize::MAX)),
        write_budget: Arc::new(AtomicUsize::new(usize::MAX)),
    };
    let b = PipeEnd {
        incoming: a_to_b,
        outgoing: b_to_a,
        max_io: Arc::new(AtomicUsize::new(usize::MAX)),
        write_budget: Arc::new(AtomicUsize::new(usize::MAX)),
    };
    (a, b)
}

impl PipeEnd {
    /// Cap the number of bytes a single `read` or `write` call on this end
    /// may move. Zero behaves like a permanently would-blocked transport.
    pub fn set_max_io(&self, cap: usize) {
        self.max_io.store(cap, Ordering::SeqCst);
    }

    /// Limit the *total* bytes this end may still write. Once spent, writes
    /// return zero (would-block) until the budget is raised again; this is
    /// how tests park the client in its partially-sent state.
    pub fn set_write_budget(&self, budget: usize) {
        self.write_budget.store(budget, Ordering::SeqCst);
    }

    /// Bytes queued toward this end that have not been read yet.
    #[must_use]
    pub fn pending_incoming(&self) -> usize {
        lock(&self.incoming).len()
    }

    fn cap(&self) -> usize {
        self.max_io.load(Ordering::SeqCst)
    }
}

impl Transport for PipeEnd {
    fn read(&self, buf: &mut [u8]) -> usize {
        let limit = buf.len().min(self.cap());
        let mut incoming = lock(&self.incoming);
        let mut count = 0usize;
        while count < limit {
            match incoming.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                },
                None => break,
            }
        }
        count
    }

    fn write(&self, buf: &[u8]) -> usize {
        let budget = self.write_budget.load(Ordering::SeqCst);
        let limit = buf.len().min(self.cap()).min(budget);
        if limit == 0 {
            return 0;
        }
        if budget != usize::MAX {
            self.write_budget.store(budget - limit, Ordering::SeqCst);
        }
        let mut outgoing = lock(&self.outgoing);
        outgoing.extend(&buf[..limit]);
        limit
    }
}
