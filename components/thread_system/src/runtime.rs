//! The global lock and the scheduler protocol.
//!
//! The runtime is a single-giant-lock design: at most one thread executes
//! interpreter code at any instant, and that right is exactly "holding the
//! guard of `ThreadRuntime::state`". A registered native thread runs
//! interpreter code through [`ThreadRuntime::enter`], which acquires the
//! lock, performs switch-in bookkeeping and hands the caller an
//! [`ExecGuard`]. Every threading primitive is a method on the guard.
//!
//! Switch-in bookkeeping (`post_acquire`) runs after *every* acquisition
//! of the global lock, in a fixed order:
//! 1. if the previously running thread differs, pop its dynamic bindings
//!    and install ours
//! 2. re-select our active resource through the runtime hooks
//! 3. deliver any pending cross-thread signal
//!
//! Step 3 makes every reacquisition a delivery point: a signal injected
//! while a thread was parked in a blocking primitive surfaces on the way
//! out of that primitive, never mid-switch.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use core_types::{ResourceId, Symbol, Value};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::ThreadError;
use crate::hooks::{NoopHooks, RuntimeHooks};
use crate::state::{Blocker, Thread, ThreadId, ThreadRecord};

/// Everything the global lock protects.
pub(crate) struct RuntimeState {
    /// The thread currently entitled to run interpreter code. `None`
    /// between the death of the running thread and the next switch-in.
    pub(crate) current: Option<ThreadId>,
    /// Registry of all threads, keyed by identity. Always contains the
    /// primary thread; a dying thread removes its own entry, after
    /// broadcasting its death.
    pub(crate) threads: HashMap<ThreadId, ThreadRecord>,
    /// Native thread identity -> interpreter thread identity.
    pub(crate) native_ids: HashMap<std::thread::ThreadId, ThreadId>,
    /// The shared table of dynamically scoped variables. Holds the
    /// running thread's bindings; other threads' bindings are shelved in
    /// their own stacks.
    pub(crate) globals: HashMap<Symbol, Value>,
    /// Next thread identity to allocate.
    pub(crate) next_id: u64,
    /// False while the runtime is still bootstrapping; spawning is fatal
    /// until this is set.
    pub(crate) initialized: bool,
}

impl RuntimeState {
    /// Pops `tid`'s bindings out of the global table (switch-out half).
    fn swap_bindings_out(&mut self, tid: ThreadId) {
        let RuntimeState {
            threads, globals, ..
        } = self;
        if let Some(stack) = threads.get_mut(&tid).and_then(|r| r.bindings.as_mut()) {
            stack.swap_out(globals);
        }
    }

    /// Re-installs `tid`'s bindings into the global table (switch-in half).
    fn swap_bindings_in(&mut self, tid: ThreadId) {
        let RuntimeState {
            threads, globals, ..
        } = self;
        if let Some(stack) = threads.get_mut(&tid).and_then(|r| r.bindings.as_mut()) {
            stack.swap_in(globals);
        }
    }
}

/// The concurrency core of the interpreter runtime.
///
/// One instance per interpreter. The constructing thread becomes the
/// primary thread and stays registered for the lifetime of the runtime.
///
/// # Examples
///
/// ```
/// use thread_system::ThreadRuntime;
/// use core_types::{Symbol, Value};
///
/// let rt = ThreadRuntime::new();
/// rt.enter(|exec| {
///     exec.set_var(Symbol::new("x"), Value::Int(1));
///     assert_eq!(exec.get_var(&Symbol::new("x")), Some(Value::Int(1)));
/// })
/// .unwrap();
/// ```
pub struct ThreadRuntime {
    state: Mutex<RuntimeState>,
    hooks: Box<dyn RuntimeHooks>,
}

impl ThreadRuntime {
    /// Creates a runtime with no-op collaborator hooks, registering the
    /// calling thread as the primary thread.
    ///
    /// The runtime starts fully initialized; embedders that need a
    /// bootstrap phase use [`ThreadRuntime::bootstrap`].
    pub fn new() -> Arc<Self> {
        let rt = Self::bootstrap(Box::new(NoopHooks));
        rt.finish_bootstrap();
        rt
    }

    /// Creates a runtime with the given hooks, registering the calling
    /// thread as the primary thread.
    pub fn with_hooks(hooks: Box<dyn RuntimeHooks>) -> Arc<Self> {
        let rt = Self::bootstrap(hooks);
        rt.finish_bootstrap();
        rt
    }

    /// Creates a runtime in bootstrap mode: all primitives work on the
    /// primary thread, but spawning aborts until
    /// [`ThreadRuntime::finish_bootstrap`] is called.
    pub fn bootstrap(hooks: Box<dyn RuntimeHooks>) -> Arc<Self> {
        let primary_id = ThreadId(0);
        let primary = Thread::new(primary_id, None);
        let mut record = ThreadRecord::new(primary, ResourceId::default());
        record.native = Some(std::thread::current().id());

        let mut threads = HashMap::new();
        threads.insert(primary_id, record);
        let mut native_ids = HashMap::new();
        native_ids.insert(std::thread::current().id(), primary_id);

        Arc::new(ThreadRuntime {
            state: Mutex::new(RuntimeState {
                current: Some(primary_id),
                threads,
                native_ids,
                globals: HashMap::new(),
                next_id: 1,
                initialized: false,
            }),
            hooks,
        })
    }

    /// Marks bootstrap as finished, enabling `make_thread`.
    pub fn finish_bootstrap(&self) {
        self.state.lock().initialized = true;
    }

    /// Acquires the global lock for the calling thread and runs `f` with
    /// the execution guard.
    ///
    /// Switch-in bookkeeping runs before `f`; if a pending signal is
    /// delivered there, `f` does not run and the signal is returned.
    /// The lock is released when `f` returns.
    ///
    /// # Panics
    ///
    /// Panics if the calling native thread is not registered with this
    /// runtime (only the primary thread and threads started by
    /// `make_thread` may enter). Calling `enter` re-entrantly from
    /// inside an `enter` on the same thread deadlocks.
    pub fn enter<R>(self: &Arc<Self>, f: impl FnOnce(&mut ExecGuard<'_>) -> R) -> Result<R, ThreadError> {
        let guard = self.state.lock();
        let tid = guard
            .native_ids
            .get(&std::thread::current().id())
            .copied()
            .expect("enter called from a thread not registered with this runtime");
        let mut exec = ExecGuard {
            rt: self,
            guard: Some(guard),
            thread: tid,
        };
        exec.post_acquire()?;
        Ok(f(&mut exec))
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock()
    }

    pub(crate) fn hooks(&self) -> &dyn RuntimeHooks {
        &*self.hooks
    }
}

/// Proof that the current thread holds the global lock, and the receiver
/// of every threading primitive.
///
/// Blocking primitives release the lock internally (waiting a native
/// condition variable against it, or dropping and re-taking it) so other
/// threads can run while this one is parked; switch-in bookkeeping runs
/// again on the way out.
pub struct ExecGuard<'rt> {
    pub(crate) rt: &'rt Arc<ThreadRuntime>,
    /// `None` only transiently inside `thread_yield`/`run_unlocked`.
    pub(crate) guard: Option<MutexGuard<'rt, RuntimeState>>,
    pub(crate) thread: ThreadId,
}

impl<'rt> ExecGuard<'rt> {
    pub(crate) fn state(&mut self) -> &mut RuntimeState {
        self.guard.as_mut().expect("global lock not held")
    }

    /// Parks on `condvar`, releasing the global lock for the duration of
    /// the wait. Wakeups may be spurious; callers re-check their own
    /// predicate.
    pub(crate) fn wait_on(&mut self, condvar: &Condvar) {
        condvar.wait(self.guard.as_mut().expect("global lock not held"));
    }

    /// Switch-in bookkeeping. Must run after every acquisition of the
    /// global lock, including ones that do not change the running thread.
    pub(crate) fn post_acquire(&mut self) -> Result<(), ThreadError> {
        let tid = self.thread;
        let st = self.guard.as_mut().expect("global lock not held");

        if st.current != Some(tid) {
            // `current` is None if the previously running thread just
            // died; there is nothing to unbind then.
            if let Some(prev) = st.current {
                st.swap_bindings_out(prev);
            }
            st.current = Some(tid);
            st.swap_bindings_in(tid);
        }

        // The active-resource slot is process-wide, so it must be
        // re-selected even when the running thread did not change.
        let resource = st
            .threads
            .get(&tid)
            .map(|r| r.resource)
            .expect("running thread missing from registry");
        self.rt.hooks().select_resource(resource);

        let st = self.guard.as_mut().expect("global lock not held");
        if let Some(signal) = st.threads.get_mut(&tid).and_then(|r| r.pending.take()) {
            return Err(ThreadError::Signaled(signal));
        }
        Ok(())
    }

    /// The handle of the thread running this guard.
    pub fn current_thread(&mut self) -> Thread {
        let tid = self.thread;
        self.state()
            .threads
            .get(&tid)
            .map(|r| r.handle.clone())
            .expect("running thread missing from registry")
    }

    /// Yields the CPU to another thread.
    ///
    /// Releases the global lock, hints the OS scheduler, reacquires the
    /// lock. A delivery point: a signal injected meanwhile is raised here.
    pub fn thread_yield(&mut self) -> Result<(), ThreadError> {
        let guard = self.guard.take().expect("global lock not held");
        drop(guard);
        std::thread::yield_now();
        self.reacquire()
    }

    /// Runs a native blocking operation without the global lock.
    ///
    /// Other threads may run interpreter code while `f` blocks. The lock
    /// is reacquired afterwards with full switch-in bookkeeping, so this
    /// is a delivery point; `f`'s result is returned only if no signal
    /// was delivered.
    ///
    /// If `f` panics, the lock is reacquired before the panic resumes,
    /// so callers unwinding through this guard still hold it.
    pub fn run_unlocked<R>(&mut self, f: impl FnOnce() -> R) -> Result<R, ThreadError> {
        let guard = self.guard.take().expect("global lock not held");
        drop(guard);
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        self.guard = Some(self.rt.lock_state());
        match result {
            Ok(value) => {
                self.post_acquire()?;
                Ok(value)
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn reacquire(&mut self) -> Result<(), ThreadError> {
        self.guard = Some(self.rt.lock_state());
        self.post_acquire()
    }

    /// Selects `resource` as the current thread's (and the process-wide)
    /// active resource.
    pub fn select_resource(&mut self, resource: ResourceId) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.resource = resource;
        }
        self.rt.hooks().select_resource(resource);
    }

    /// The resource the current thread has selected.
    pub fn active_resource(&mut self) -> ResourceId {
        let tid = self.thread;
        self.state()
            .threads
            .get(&tid)
            .map(|r| r.resource)
            .expect("running thread missing from registry")
    }

    /// True if some other thread currently has `resource` selected.
    ///
    /// Resource owners use this before destroying a resource to avoid
    /// pulling it out from under another thread.
    pub fn resource_in_use_elsewhere(&mut self, resource: ResourceId) -> bool {
        let tid = self.thread;
        self.state()
            .threads
            .iter()
            .any(|(id, record)| *id != tid && record.resource == resource)
    }

    /// The current thread's last-search cache.
    pub fn last_search(&mut self) -> Value {
        let tid = self.thread;
        self.state()
            .threads
            .get(&tid)
            .map(|r| r.last_search.clone())
            .unwrap_or(Value::Nil)
    }

    /// Replaces the current thread's last-search cache.
    pub fn set_last_search(&mut self, value: Value) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.last_search = value;
        }
    }

    /// Saves the search cache aside (used around match-data save/restore).
    pub fn save_last_search(&mut self) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.saved_last_search = record.last_search.clone();
        }
    }

    /// Restores the search cache saved by `save_last_search`.
    pub fn restore_last_search(&mut self) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.last_search = record.saved_last_search.clone();
        }
    }

    // Internal helpers shared by the blocking primitives.

    pub(crate) fn set_blocker(&mut self, blocker: Option<Blocker>) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.blocker = blocker;
        }
    }

    pub(crate) fn set_wake(&mut self, wake: Option<Arc<Condvar>>) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.wake = wake;
        }
    }

    pub(crate) fn has_pending(&mut self) -> bool {
        let tid = self.thread;
        self.state()
            .threads
            .get(&tid)
            .map(|r| r.pending.is_some())
            .unwrap_or(false)
    }
}
