//! Root-enumeration bridge for the garbage collector.
//!
//! The collector owns marking and sweeping; this module only guarantees
//! that every live root held by any thread is reported, which is
//! race-free because enumeration runs while the enumerating thread holds
//! the global lock and no other thread can touch interpreter state.
//!
//! Enumeration covers both sides of the dynamic-binding world: the
//! values currently installed in the shared variable table, and the
//! per-thread side (shelved binding values, explicitly registered
//! roots, pending-signal payloads and the search caches).

use core_types::{ResourceId, Value};

use crate::runtime::ExecGuard;
use crate::state::Thread;

/// Receiver for the roots of all threads.
///
/// `visit_value` is required; the other callbacks default to ignoring
/// collectors that do not track those root kinds.
pub trait RootVisitor {
    /// A live interpreter value held by some thread.
    fn visit_value(&mut self, value: &Value);

    /// A thread object itself (threads are program-level values).
    fn visit_thread(&mut self, thread: &Thread) {
        let _ = thread;
    }

    /// A resource handle some thread has selected.
    fn visit_resource(&mut self, resource: ResourceId) {
        let _ = resource;
    }
}

impl ExecGuard<'_> {
    /// Reports every value in the shared variable table and every root
    /// retained by every registered thread, including threads in the act
    /// of dying that have not yet unlinked.
    ///
    /// Must be called by the collecting thread; holding the guard is the
    /// proof that no other thread is mutating the registry.
    pub fn enumerate_roots(&mut self, visitor: &mut dyn RootVisitor) {
        let st = self.state();
        for value in st.globals.values() {
            visitor.visit_value(value);
        }
        for record in st.threads.values() {
            visitor.visit_thread(&record.handle);

            if let Some(stack) = record.bindings.as_ref() {
                for value in stack.shelved_values() {
                    visitor.visit_value(value);
                }
            }
            for value in &record.gc_roots {
                visitor.visit_value(value);
            }
            if let Some(signal) = record.pending.as_ref() {
                visitor.visit_value(&signal.data);
            }
            visitor.visit_value(&record.last_search);
            visitor.visit_value(&record.saved_last_search);
            visitor.visit_resource(record.resource);
        }
    }

    /// Registers `value` as a root of the current thread until the
    /// matching `pop_gc_root`. This is the explicit root list for
    /// values that live only on the native stack.
    pub fn push_gc_root(&mut self, value: Value) {
        let tid = self.thread;
        if let Some(record) = self.state().threads.get_mut(&tid) {
            record.gc_roots.push(value);
        }
    }

    /// Unregisters the most recently pushed root of the current thread.
    pub fn pop_gc_root(&mut self) -> Option<Value> {
        let tid = self.thread;
        self.state()
            .threads
            .get_mut(&tid)
            .and_then(|r| r.gc_roots.pop())
    }
}
