//! Thread lifecycle: spawn, run, signal, join, enumerate.
//!
//! A thread is *spawned*, then *running* until its body returns (or is
//! unwound by an injected signal), then *dead* forever. A blocked thread
//! is still running; its registry record just carries a blocker. Death
//! follows a strict order: exit hook, unbind, release the binding stack,
//! clear the running-thread pointer, broadcast the death signal, unlink
//! from the registry, release the global lock. Broadcasting before
//! unlinking means a collector pass racing with death always sees either
//! a fully live record or no record at all.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use core_types::{Signal, Symbol, Value};

use crate::error::ThreadError;
use crate::runtime::{ExecGuard, ThreadRuntime};
use crate::state::{Blocker, Thread, ThreadId, ThreadRecord};

impl ExecGuard<'_> {
    /// Starts a new thread running `body`.
    ///
    /// The new thread gets a fresh dynamic-binding stack and inherits the
    /// caller's active resource. `name`, if given, also names the native
    /// thread. The handle is returned as soon as the native thread is
    /// created; the new thread's own fields finish initializing under the
    /// global lock on its first switch-in.
    ///
    /// The body's error result is discarded: a thread that fails simply
    /// dies, and callers observe that through `thread_alive` or
    /// `thread_join`.
    ///
    /// # Panics
    ///
    /// Panics if the runtime is still bootstrapping. That is a fatal
    /// embedding bug, not a recoverable condition.
    pub fn make_thread<F>(&mut self, body: F, name: Option<&str>) -> Result<Thread, ThreadError>
    where
        F: for<'a> FnOnce(&mut ExecGuard<'a>) -> Result<Value, ThreadError> + Send + 'static,
    {
        let parent = self.thread;
        let st = self.state();
        assert!(
            st.initialized,
            "make_thread called before runtime initialization finished"
        );

        let id = ThreadId(st.next_id);
        st.next_id += 1;
        let handle = Thread::new(id, name.map(str::to_owned));

        let resource = st
            .threads
            .get(&parent)
            .map(|r| r.resource)
            .expect("running thread missing from registry");
        st.threads.insert(id, ThreadRecord::new(handle.clone(), resource));

        let rt = Arc::clone(self.rt);
        let thread = handle.clone();
        let mut builder = std::thread::Builder::new();
        if let Some(n) = name {
            builder = builder.name(n.to_owned());
        }

        match builder.spawn(move || run_thread(rt, thread, Box::new(body))) {
            Ok(_detached) => Ok(handle),
            Err(err) => {
                // Roll back the registration before reporting.
                self.state().threads.remove(&id);
                Err(ThreadError::Spawn(err))
            }
        }
    }

    /// True from spawn until the thread's body has returned; false
    /// forever after.
    pub fn thread_alive(&mut self, thread: &Thread) -> bool {
        self.state()
            .threads
            .get(&thread.id())
            .map(|r| r.alive())
            .unwrap_or(false)
    }

    /// The object `thread` is currently parked on, if it is blocked in
    /// `mutex_lock`, `condition_wait` or `thread_join`.
    pub fn thread_blocker(&mut self, thread: &Thread) -> Option<Blocker> {
        self.state()
            .threads
            .get(&thread.id())
            .and_then(|r| r.blocker.clone())
    }

    /// Handles of all live threads, snapshotted atomically under the
    /// global lock.
    pub fn all_threads(&mut self) -> Vec<Thread> {
        self.state()
            .threads
            .values()
            .filter(|r| r.alive())
            .map(|r| r.handle.clone())
            .collect()
    }

    /// Blocks until `target` has exited.
    ///
    /// Returns immediately if `target` is already dead. Errors if
    /// `target` is the calling thread. A delivery point: a signal
    /// injected while waiting is raised here.
    pub fn thread_join(&mut self, target: &Thread) -> Result<(), ThreadError> {
        if target.id() == self.thread {
            return Err(ThreadError::JoinSelf);
        }
        if !self.thread_alive(target) {
            return Ok(());
        }

        self.set_blocker(Some(Blocker::Thread(target.clone())));
        self.set_wake(Some(target.death_condvar()));
        let death = target.death_condvar();
        while self.thread_alive(target) && !self.has_pending() {
            self.wait_on(&death);
        }
        self.set_wake(None);
        self.set_blocker(None);
        self.post_acquire()?;
        Ok(())
    }

    /// Raises `(symbol, data)` in `target`.
    ///
    /// If `target` is the calling thread, the signal is raised
    /// immediately (returned as an error from this call). Otherwise it is
    /// stored as the target's pending signal, replacing any undelivered
    /// one, and the target is woken if it is parked in a blocking
    /// primitive; delivery happens at the target's next delivery point.
    pub fn thread_signal(
        &mut self,
        target: &Thread,
        symbol: Symbol,
        data: Value,
    ) -> Result<(), ThreadError> {
        let signal = Signal::new(symbol, data);
        if target.id() == self.thread {
            return Err(ThreadError::Signaled(signal));
        }

        let wake = match self.state().threads.get_mut(&target.id()) {
            Some(record) => {
                record.pending = Some(signal);
                record.wake.clone()
            }
            // Already dead and unlinked; the signal has nowhere to go.
            None => None,
        };
        if let Some(wake) = wake {
            wake.notify_all();
        }
        Ok(())
    }
}

type ThreadBody = Box<dyn for<'a> FnOnce(&mut ExecGuard<'a>) -> Result<Value, ThreadError> + Send>;

/// Entry trampoline, run on the new native thread.
fn run_thread(rt: Arc<ThreadRuntime>, thread: Thread, body: ThreadBody) {
    let tid = thread.id();
    let native = std::thread::current().id();

    let guard = rt.lock_state();
    let mut exec = ExecGuard {
        rt: &rt,
        guard: Some(guard),
        thread: tid,
    };
    {
        let st = exec.state();
        st.native_ids.insert(native, tid);
        if let Some(record) = st.threads.get_mut(&tid) {
            record.native = Some(native);
        }
    }

    // First switch-in. A signal injected between spawn and here kills
    // the body before it starts, like any other unhandled signal.
    if exec.post_acquire().is_ok() {
        // Errors and panics from the body are discarded; the thread
        // simply dies. Liveness polling and joins observe the death.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| body(&mut exec)));
    }

    rt.hooks().thread_exited(&thread);

    // Restore any bindings the body left installed, then clear liveness.
    exec.unbind_to(0);
    let st = exec.state();
    if let Some(record) = st.threads.get_mut(&tid) {
        record.bindings = None;
    }
    if st.current == Some(tid) {
        st.current = None;
    }

    // Broadcast death before unlinking, so a joiner or collector racing
    // with us sees a dead-but-complete record, never a freed one.
    thread.death_condvar().notify_all();
    let st = exec.state();
    st.native_ids.remove(&native);
    st.threads.remove(&tid);
    // Dropping the guard releases the global lock.
}
