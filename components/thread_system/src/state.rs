//! Per-thread interpreter state and the thread registry records.

use std::fmt;
use std::sync::Arc;

use core_types::{ResourceId, Signal, Value};
use parking_lot::Condvar;

use crate::bindings::BindingStack;
use crate::condvar::Condition;
use crate::mutex::ReentrantMutex;

/// Stable identity of an interpreter thread.
///
/// Identifiers are allocated once, never reused, and remain valid as
/// handles after the thread has died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub(crate) u64);

/// A program-visible thread handle.
///
/// Handles are cheap to clone and stay usable after the thread dies:
/// `thread_alive` simply reports false, and the name remains readable.
#[derive(Clone)]
pub struct Thread {
    shared: Arc<ThreadShared>,
}

struct ThreadShared {
    id: ThreadId,
    name: Option<String>,
    /// Broadcast exactly once, when the thread terminates, to release
    /// joiners. Lives in the handle so joiners can keep waiting on it
    /// even while the dying thread unlinks its registry record.
    death: Arc<Condvar>,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, name: Option<String>) -> Self {
        Thread {
            shared: Arc::new(ThreadShared {
                id,
                name,
                death: Arc::new(Condvar::new()),
            }),
        }
    }

    pub(crate) fn id(&self) -> ThreadId {
        self.shared.id
    }

    /// The name given at spawn, if any. Informational only.
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    pub(crate) fn death_condvar(&self) -> Arc<Condvar> {
        Arc::clone(&self.shared.death)
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.shared.id.0)
            .field("name", &self.shared.name)
            .finish()
    }
}

/// The synchronization object a thread is currently parked on.
///
/// A thread appears blocked on at most one object at a time; the slot is
/// set before any wait and cleared on every exit path, so external
/// observers always see either nothing or the real blocker.
#[derive(Clone, Debug)]
pub enum Blocker {
    /// Parked in `mutex_lock`
    Mutex(ReentrantMutex),
    /// Parked in `condition_wait`
    Condition(Condition),
    /// Parked in `thread_join` on this thread
    Thread(Thread),
}

/// Registry record for one interpreter thread.
///
/// All fields are read and written only under the global lock.
pub(crate) struct ThreadRecord {
    /// Program-visible handle
    pub(crate) handle: Thread,
    /// Dynamic-binding stack; `None` exactly when the thread is dead
    pub(crate) bindings: Option<BindingStack>,
    /// The resource this thread has selected, re-selected on switch-in
    pub(crate) resource: ResourceId,
    /// Signal injected by another thread, awaiting delivery (single slot,
    /// last write wins)
    pub(crate) pending: Option<Signal>,
    /// What this thread is currently parked on, if anything
    pub(crate) blocker: Option<Blocker>,
    /// The native condition variable this thread is parked inside, used
    /// by cross-thread wake
    pub(crate) wake: Option<Arc<Condvar>>,
    /// Last search result cache, kept per thread
    pub(crate) last_search: Value,
    /// Saved copy of the search cache
    pub(crate) saved_last_search: Value,
    /// Explicitly registered roots for the collector
    pub(crate) gc_roots: Vec<Value>,
    /// Native identity, recorded once the thread has started
    pub(crate) native: Option<std::thread::ThreadId>,
}

impl ThreadRecord {
    pub(crate) fn new(handle: Thread, resource: ResourceId) -> Self {
        ThreadRecord {
            handle,
            bindings: Some(BindingStack::new()),
            resource,
            pending: None,
            blocker: None,
            wake: None,
            last_search: Value::Nil,
            saved_last_search: Value::Nil,
            gc_roots: Vec::new(),
            native: None,
        }
    }

    pub(crate) fn alive(&self) -> bool {
        self.bindings.is_some()
    }
}
