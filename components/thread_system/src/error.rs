//! Error types for the threading core.
//!
//! Usage violations are reported synchronously to the caller and never
//! cross a thread boundary. The only cross-thread error channel is
//! `Signaled`, carrying a signal injected with `thread_signal` and
//! delivered at the target's next delivery point.

use core_types::Signal;
use thiserror::Error;

/// Errors reported by threading primitives.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// The current thread does not own the mutex it tried to operate on.
    #[error("mutex is not owned by the current thread")]
    NotOwned,

    /// A thread attempted to join itself.
    #[error("cannot join current thread")]
    JoinSelf,

    /// The operating system refused to create a native thread.
    #[error("could not start a new thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// An interpreter-level signal was raised in the current thread,
    /// either synchronously or injected by another thread.
    #[error(transparent)]
    Signaled(#[from] Signal),
}

impl ThreadError {
    /// Returns the carried signal, if this error is a delivered signal.
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            ThreadError::Signaled(sig) => Some(sig),
            _ => None,
        }
    }
}
