//! Interpreter value representation.
//!
//! This module provides the `Value` enum used by the threading core for
//! everything it stores on behalf of the interpreter: dynamic-binding
//! values, signal payloads, per-thread search caches and explicit GC roots.
//! The full evaluator carries a richer representation; this is the slice
//! the runtime components share.

use std::fmt;
use std::sync::Arc;

/// An interned-style symbol name.
///
/// Symbols are cheap to clone (shared string storage) and compare by
/// content, so two independently created symbols with the same name are
/// equal.
///
/// # Examples
///
/// ```
/// use core_types::Symbol;
///
/// let a = Symbol::new("counter");
/// let b = Symbol::new("counter");
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Creates a symbol from a name.
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    /// Returns the symbol's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents any interpreter value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let nil = Value::Nil;
/// let count = Value::Int(42);
///
/// assert!(nil.is_nil());
/// assert!(!count.is_nil());
/// assert_eq!(count.type_of(), "integer");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The empty value, also the false value
    Nil,
    /// Boolean truth value
    Boolean(bool),
    /// Signed integer
    Int(i64),
    /// Immutable text
    Text(Arc<str>),
    /// Symbol reference
    Symbol(Symbol),
    /// Proper list of values
    List(Vec<Value>),
}

impl Value {
    /// Creates a text value from a string slice.
    pub fn text(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }

    /// Creates a symbol value from a name.
    pub fn symbol(name: &str) -> Self {
        Value::Symbol(Symbol::new(name))
    }

    /// Returns true if this value is `Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns true for every value except `Nil` and `Boolean(false)`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Returns the type name of this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Text(_) => "text",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
        }
    }

    /// Returns the integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(true) => write!(f, "t"),
            Value::Boolean(false) => write!(f, "false"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Opaque handle to a document/buffer-like resource.
///
/// The threading core never inspects the resource itself; it only tracks
/// which handle each thread has selected and re-selects it on every
/// context switch through the runtime hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);
