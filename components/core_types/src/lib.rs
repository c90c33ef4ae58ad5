//! Core Types - interpreter value and signal primitives
//!
//! This component provides the small slice of the interpreter's value layer
//! that other components need:
//! - `Value` and `Symbol` for dynamic-binding values, signal payloads and
//!   thread-local caches
//! - `Signal` for interpreter-level errors raised with `signal`
//! - `ResourceId` as the opaque handle to the currently selected
//!   document-like resource

pub mod error;
pub mod value;

pub use error::Signal;
pub use value::{ResourceId, Symbol, Value};
