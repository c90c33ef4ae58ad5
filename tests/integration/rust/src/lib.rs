//! Integration test suite for the interpreter threading core
//!
//! This crate provides scenario tests that exercise the threading core
//! end to end: several native threads running interpreter primitives
//! against one runtime, coordinated only through the public API.

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use thread_system;
}
