//! Program-level condition variables.
//!
//! A condition variable is bound to one reentrant mutex for its whole
//! life. Waiting fully releases the mutex (whatever its recursion count)
//! and restores that count before returning, so callers can wait from
//! inside nested critical sections.

use std::fmt;
use std::sync::Arc;

use parking_lot::Condvar;

use crate::error::ThreadError;
use crate::mutex::ReentrantMutex;
use crate::runtime::ExecGuard;
use crate::state::Blocker;

struct ConditionCore {
    mutex: ReentrantMutex,
    name: Option<String>,
    /// Waited against the global lock by waiting threads.
    signal: Arc<Condvar>,
}

/// A condition variable bound to a [`ReentrantMutex`].
///
/// Handles are cheap to clone and all refer to the same condition.
#[derive(Clone)]
pub struct Condition {
    core: Arc<ConditionCore>,
}

impl Condition {
    /// Creates a condition variable bound to `mutex`. The name is
    /// informational only.
    pub fn new(mutex: ReentrantMutex, name: Option<&str>) -> Self {
        Condition {
            core: Arc::new(ConditionCore {
                mutex,
                name: name.map(str::to_owned),
                signal: Arc::new(Condvar::new()),
            }),
        }
    }

    /// The mutex this condition was bound to at creation.
    pub fn mutex(&self) -> &ReentrantMutex {
        &self.core.mutex
    }

    /// The name given at creation, if any.
    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Condition {}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.core.name)
            .finish()
    }
}

impl ExecGuard<'_> {
    /// Waits for `condition` to be notified, or for this thread to be
    /// signalled with `thread_signal`.
    ///
    /// The bound mutex must be owned by the current thread; it is fully
    /// released for the duration of the wait and re-locked with the same
    /// recursion count before this returns (even when the wait is cut
    /// short by a signal, which is then raised here). Wakeups may be
    /// spurious; callers re-check their own condition.
    pub fn condition_wait(&mut self, condition: &Condition) -> Result<(), ThreadError> {
        let mutex = condition.mutex().clone();
        if !self.mutex_owned(&mutex) {
            return Err(ThreadError::NotOwned);
        }

        self.set_blocker(Some(Blocker::Condition(condition.clone())));
        let saved = mutex.unlock_for_wait(self);
        // If we were signalled while releasing, skip the wait, but still
        // reacquire the lock.
        if !self.has_pending() {
            self.set_wake(Some(Arc::clone(&condition.core.signal)));
            self.wait_on(&condition.core.signal);
            self.set_wake(None);
        }
        mutex.lock_internal(self, saved);
        self.set_blocker(None);
        self.post_acquire()?;
        Ok(())
    }

    /// Wakes one waiter of `condition`, or all of them if `all` is true.
    ///
    /// The bound mutex must be owned by the current thread. It is
    /// released while the wakeup is sent and re-locked with the same
    /// recursion count before this returns, so waiters can take it
    /// without first waiting for the notifier to block; the mutex is
    /// momentarily unowned during the notify, which callers must
    /// tolerate.
    pub fn condition_notify(&mut self, condition: &Condition, all: bool) -> Result<(), ThreadError> {
        let mutex = condition.mutex().clone();
        if !self.mutex_owned(&mutex) {
            return Err(ThreadError::NotOwned);
        }

        let saved = mutex.unlock_for_wait(self);
        if all {
            condition.core.signal.notify_all();
        } else {
            condition.core.signal.notify_one();
        }
        mutex.lock_internal(self, saved);
        self.post_acquire()?;
        Ok(())
    }
}
