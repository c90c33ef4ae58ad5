//! Interpreter-level signals.
//!
//! A signal is the interpreter's error object: an error symbol naming the
//! condition plus arbitrary associated data. Signals raised in one thread
//! can be injected into another thread, where they are delivered at that
//! thread's next delivery point.

use crate::value::{Symbol, Value};
use thiserror::Error;

/// An interpreter-level error: `(error-symbol . data)`.
///
/// # Examples
///
/// ```
/// use core_types::{Signal, Symbol, Value};
///
/// let sig = Signal::new(Symbol::new("quit"), Value::Nil);
/// assert_eq!(sig.symbol.name(), "quit");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{symbol}: {data}")]
pub struct Signal {
    /// Symbol naming the error condition
    pub symbol: Symbol,
    /// Associated error data
    pub data: Value,
}

impl Signal {
    /// Creates a signal from an error symbol and its data.
    pub fn new(symbol: Symbol, data: Value) -> Self {
        Signal { symbol, data }
    }
}
