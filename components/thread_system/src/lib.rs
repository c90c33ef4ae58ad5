//! Thread System - the concurrency core of the interpreter runtime
//!
//! This component lets multiple native threads execute interpreter code
//! while preserving a single-interpreter illusion:
//! - One global lock gates all interpreter-code execution
//! - Per-thread dynamic-binding stacks, swapped on context switch
//! - Reentrant program-level mutexes and condition variables with
//!   interruptible waits
//! - Thread lifecycle (spawn, join, signal, yield, enumerate)
//! - A root-enumeration bridge for the garbage collector
//!
//! There is no parallel execution of interpreter code and no user-level
//! scheduler; threads are native and preemptive, and coordination happens
//! entirely through the one lock.

pub mod bindings;
pub mod condvar;
pub mod error;
pub mod gc;
pub mod hooks;
pub mod lifecycle;
pub mod mutex;
pub mod runtime;
pub mod state;

// Re-export main types
pub use bindings::BindingStack;
pub use condvar::Condition;
pub use error::ThreadError;
pub use gc::RootVisitor;
pub use hooks::{NoopHooks, RuntimeHooks};
pub use mutex::ReentrantMutex;
pub use runtime::{ExecGuard, ThreadRuntime};
pub use state::{Blocker, Thread};
