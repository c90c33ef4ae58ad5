//! Collaborator hooks consumed by the threading core.
//!
//! The core treats the document/buffer layer and the process table as
//! external collaborators. It guarantees *when* these hooks run (always
//! under the global lock), not what they do.

use crate::state::Thread;
use core_types::ResourceId;

/// Callbacks into the embedding runtime.
///
/// Both hooks are invoked while the global lock is held by the calling
/// thread; implementations must not re-enter the runtime.
pub trait RuntimeHooks: Send + Sync {
    /// Re-select the process-wide active resource.
    ///
    /// Called as part of switch-in bookkeeping after every acquisition of
    /// the global lock, and when a thread explicitly selects a resource.
    fn select_resource(&self, resource: ResourceId) {
        let _ = resource;
    }

    /// A thread that may have held resource references has died.
    ///
    /// Called from the dying thread's trampoline after its body has
    /// returned, before its liveness is cleared.
    fn thread_exited(&self, thread: &Thread) {
        let _ = thread;
    }
}

/// Hooks implementation that ignores every callback.
pub struct NoopHooks;

impl RuntimeHooks for NoopHooks {}
