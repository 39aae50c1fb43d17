//! Cooperative cancellation.
//!
//! A [`CancelToken`] is the "still executing" signal the protocol layer owns. The scheduler
//! polls it at every phase and round boundary and fails with [`Error::Cancelled`] once it
//! has been tripped. Clones share the same flag.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct CancelToken {
    executing: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the executing state.
    pub fn new() -> Self {
        Self {
            executing: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Trips the token. Every holder observes it at its next poll.
    pub fn cancel(&self) {
        self.executing.store(false, Ordering::SeqCst);
    }

    /// Re-arms a tripped token.
    pub fn resume(&self) {
        self.executing.store(true, Ordering::SeqCst);
    }

    /// Returns [`Error::Cancelled`] if the token has been tripped.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_executing() {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
