//! Cancellation and deadline propagation
//!
//! A `Context` is passed to every operation that may block on the network,
//! a subprocess or the filesystem. Clones share the same cancel flag; a
//! child created with `with_timeout` also honours the parent's deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::UpdateError;

/// Cancellation token with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled unless `cancel` is called
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires after `timeout`, or earlier if the parent does.
    ///
    /// The child shares the parent's cancel flag.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let child_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < child_deadline => parent,
            _ => child_deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// Derive a context with its own cancel flag and a fresh deadline.
    ///
    /// Used for best-effort follow-up work that must run even when the
    /// parent pass was cancelled.
    pub fn detached_with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Cancel this context and every clone sharing its flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the context was cancelled or its deadline passed
    pub fn is_done(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Return `Cancelled` if the context is done
    pub fn check(&self) -> Result<(), UpdateError> {
        if self.is_done() {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
