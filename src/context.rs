//! # Cancellation Context
//!
//! Purpose: Thread a deadline and a cancellation flag through every call
//! that may block, so socket timeouts can be derived per operation instead
//! of being fixed at connect time.
//!
//! ## Design Principles
//! 1. **Cheap to Clone**: A context is an optional instant plus a shared flag.
//! 2. **Checkpoint Before IO**: A trip detected before any byte moves leaves
//!    the connection reusable.
//! 3. **Deadline, Not Timeout**: Storing the absolute instant keeps repeated
//!    socket-timeout derivations consistent across one logical operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ClientError, ClientResult};

/// Ambient deadline and cancellation state for one logical operation.
#[derive(Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

/// Handle that trips the cancellation flag of an associated [`Context`].
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Cancels every context sharing this token's flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Context {
    /// Context with no deadline and no cancellation.
    pub fn background() -> Context {
        Context::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Context {
        Context::with_deadline(Instant::now() + timeout)
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Context {
        Context {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Attaches a cancellation flag, returning the derived context and the
    /// token that trips it.
    pub fn cancellable(self) -> (Context, CancelToken) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Context {
            deadline: self.deadline,
            cancel: Some(Arc::clone(&flag)),
        };
        (ctx, CancelToken { flag })
    }

    /// Absolute deadline, when one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Fails when the context has been cancelled or its deadline has passed.
    ///
    /// Intended to run before any IO: the resulting error carries a
    /// reusable classification because no byte has moved yet.
    pub fn checkpoint(&self) -> ClientResult<()> {
        if self.is_cancelled() {
            return Err(ClientError::Cancelled { can_reuse: true });
        }
        if let Some(deadline) = self.deadline {
            if deadline <= Instant::now() {
                return Err(ClientError::Cancelled { can_reuse: true });
            }
        }
        Ok(())
    }
}
