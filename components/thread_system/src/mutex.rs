//! Program-level reentrant mutexes.
//!
//! These are a cooperative layer over the global lock: they never make
//! threads run in parallel, they let threads order themselves around
//! critical sections that span suspension points. The owner may lock any
//! number of times; a recursion count tracks how many unlocks are owed.
//!
//! One native condition variable per mutex carries both "the mutex was
//! released" and "you were interrupted" wakeups, so release paths
//! broadcast rather than wake one waiter, and every waiter re-checks its
//! own predicate.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::ThreadError;
use crate::runtime::ExecGuard;
use crate::state::{Blocker, ThreadId};

#[derive(Default)]
struct MutexGuts {
    /// Owning thread; `count` is meaningful only while this is set.
    owner: Option<ThreadId>,
    /// Recursion count, at least 1 while owned.
    count: u32,
}

struct MutexCore {
    name: Option<String>,
    /// Owner bookkeeping. Only ever touched while the global lock is
    /// held; the inner mutex exists to give the bookkeeping a home the
    /// type system accepts, and is never held across a wait.
    guts: Mutex<MutexGuts>,
    /// Waited against the global lock by contending threads.
    signal: Arc<Condvar>,
}

/// A program-level mutex that its owner may acquire recursively.
///
/// Handles are cheap to clone and all refer to the same mutex.
#[derive(Clone)]
pub struct ReentrantMutex {
    core: Arc<MutexCore>,
}

impl ReentrantMutex {
    /// Creates a mutex. The name is informational only.
    pub fn new(name: Option<&str>) -> Self {
        ReentrantMutex {
            core: Arc::new(MutexCore {
                name: name.map(str::to_owned),
                guts: Mutex::new(MutexGuts::default()),
                signal: Arc::new(Condvar::new()),
            }),
        }
    }

    /// The name given at creation, if any.
    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }

    pub(crate) fn owned_by(&self, thread: ThreadId) -> bool {
        self.core.guts.lock().owner == Some(thread)
    }

    /// Acquires the mutex for the calling thread, waiting if necessary.
    ///
    /// `new_count == 0` is a plain acquisition: fresh ownership gets
    /// count 1, recursive acquisition increments, and a pending signal
    /// aborts a contended wait without taking ownership. `new_count > 0`
    /// restores a recursion count saved by `unlock_for_wait`: the wait
    /// ignores pending signals and ownership is always taken, because
    /// the caller (condition wait/notify) must hold the mutex again
    /// before it can deliver anything.
    ///
    /// Returns true if the slow path ran, i.e. the global lock may have
    /// been released and switch-in bookkeeping is owed.
    pub(crate) fn lock_internal(&self, exec: &mut ExecGuard<'_>, new_count: u32) -> bool {
        let tid = exec.thread;
        {
            let mut guts = self.core.guts.lock();
            if guts.owner.is_none() {
                guts.owner = Some(tid);
                guts.count = if new_count == 0 { 1 } else { new_count };
                return false;
            }
            if guts.owner == Some(tid) {
                debug_assert_eq!(new_count, 0);
                guts.count += 1;
                return false;
            }
        }

        exec.set_wake(Some(Arc::clone(&self.core.signal)));
        loop {
            let owned = self.core.guts.lock().owner.is_some();
            if !owned {
                break;
            }
            if new_count == 0 && exec.has_pending() {
                break;
            }
            exec.wait_on(&self.core.signal);
        }
        exec.set_wake(None);

        if new_count == 0 && exec.has_pending() {
            // Interrupted: report that we waited, but take no ownership.
            return true;
        }

        let mut guts = self.core.guts.lock();
        guts.owner = Some(tid);
        guts.count = if new_count == 0 { 1 } else { new_count };
        true
    }

    /// Releases one recursion level.
    ///
    /// Returns true when the count reached zero and the mutex was fully
    /// released (waiters were woken and switch-in bookkeeping is owed).
    pub(crate) fn unlock_internal(&self, exec: &mut ExecGuard<'_>) -> Result<bool, ThreadError> {
        let mut guts = self.core.guts.lock();
        if guts.owner != Some(exec.thread) {
            return Err(ThreadError::NotOwned);
        }
        guts.count -= 1;
        if guts.count > 0 {
            return Ok(false);
        }
        guts.owner = None;
        drop(guts);
        // Waiters include both lock contenders and interrupt delivery;
        // wake them all and let each re-check its predicate.
        self.core.signal.notify_all();
        Ok(true)
    }

    /// Fully releases the mutex regardless of recursion depth, returning
    /// the count so the caller can restore it afterwards. Used only by
    /// condition wait/notify, which have already checked ownership.
    pub(crate) fn unlock_for_wait(&self, exec: &mut ExecGuard<'_>) -> u32 {
        let mut guts = self.core.guts.lock();
        debug_assert_eq!(guts.owner, Some(exec.thread));
        let saved = guts.count;
        guts.count = 0;
        guts.owner = None;
        drop(guts);
        self.core.signal.notify_all();
        saved
    }
}

impl PartialEq for ReentrantMutex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for ReentrantMutex {}

impl fmt::Debug for ReentrantMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guts = self.core.guts.lock();
        f.debug_struct("ReentrantMutex")
            .field("name", &self.core.name)
            .field("owned", &guts.owner.is_some())
            .field("count", &guts.count)
            .finish()
    }
}

impl ExecGuard<'_> {
    /// Acquires `mutex`, blocking until it is available or until this
    /// thread receives a cross-thread signal (which is then raised here).
    ///
    /// Lock/unlock calls must be paired: the owner owes one unlock per
    /// successful lock.
    pub fn mutex_lock(&mut self, mutex: &ReentrantMutex) -> Result<(), ThreadError> {
        self.set_blocker(Some(Blocker::Mutex(mutex.clone())));
        let waited = mutex.lock_internal(self, 0);
        self.set_blocker(None);
        if waited {
            self.post_acquire()?;
        }
        Ok(())
    }

    /// Releases one recursion level of `mutex`.
    ///
    /// Errors if the current thread is not the owner; owner and count are
    /// untouched in that case.
    pub fn mutex_unlock(&mut self, mutex: &ReentrantMutex) -> Result<(), ThreadError> {
        let released = mutex.unlock_internal(self)?;
        if released {
            self.post_acquire()?;
        }
        Ok(())
    }

    /// True if the current thread owns `mutex`.
    pub fn mutex_owned(&mut self, mutex: &ReentrantMutex) -> bool {
        mutex.owned_by(self.thread)
    }
}
