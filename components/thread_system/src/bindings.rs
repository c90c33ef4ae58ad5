//! Per-thread dynamic-binding stacks.
//!
//! Dynamically scoped variables live in one shared global table, but each
//! thread sees its own bindings. Only the running thread's bindings are
//! installed in the table at any time; a context switch pops the outgoing
//! thread's bindings down to its stack base and re-installs the incoming
//! thread's stack.
//!
//! Each record stores the value that is currently *not* installed (the
//! "shelved" side). Installing or removing a stack is therefore a swap of
//! each record's shelved slot with the table entry, walked in opposite
//! directions for the two operations so that shadowed bindings of the
//! same symbol restore correctly.

use core_types::{Symbol, Value};
use std::collections::HashMap;

use crate::runtime::ExecGuard;

/// One dynamic binding: a symbol plus whichever value is currently
/// displaced from the global table.
#[derive(Debug)]
struct Binding {
    symbol: Symbol,
    /// While the owning thread is switched in: the outer value this
    /// binding shadows. While switched out: the thread's own value.
    /// `None` means "symbol absent from the table on that side".
    shelved: Option<Value>,
}

/// A thread's stack of dynamic-binding records.
///
/// Allocated at spawn, emptied and released exactly once at thread death.
/// "This thread is alive" is exactly "its binding stack is allocated".
#[derive(Debug, Default)]
pub struct BindingStack {
    entries: Vec<Binding>,
}

impl BindingStack {
    /// Creates an empty binding stack.
    pub fn new() -> Self {
        BindingStack {
            entries: Vec::new(),
        }
    }

    /// Current stack depth.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Pushes a binding and installs `value` in the global table,
    /// shelving whatever value the symbol had before.
    ///
    /// Caller must be the running thread (its stack is installed).
    pub(crate) fn bind(
        &mut self,
        globals: &mut HashMap<Symbol, Value>,
        symbol: Symbol,
        value: Value,
    ) {
        let shelved = globals.insert(symbol.clone(), value);
        self.entries.push(Binding { symbol, shelved });
    }

    /// Pops bindings until the stack is `depth` deep, restoring the
    /// shelved outer value of each popped binding.
    pub(crate) fn unbind_to(&mut self, globals: &mut HashMap<Symbol, Value>, depth: usize) {
        while self.entries.len() > depth {
            let binding = self.entries.pop().expect("stack deeper than depth");
            match binding.shelved {
                Some(value) => {
                    globals.insert(binding.symbol, value);
                }
                None => {
                    globals.remove(&binding.symbol);
                }
            }
        }
    }

    /// Removes this stack's bindings from the global table, top first,
    /// stashing the thread's values in the records. Switch-out half of a
    /// context switch.
    pub(crate) fn swap_out(&mut self, globals: &mut HashMap<Symbol, Value>) {
        for binding in self.entries.iter_mut().rev() {
            swap_with_table(globals, binding);
        }
    }

    /// Re-installs this stack's bindings, bottom first. Switch-in half of
    /// a context switch.
    pub(crate) fn swap_in(&mut self, globals: &mut HashMap<Symbol, Value>) {
        for binding in self.entries.iter_mut() {
            swap_with_table(globals, binding);
        }
    }

    /// The values currently shelved in this stack's records. These are
    /// live (they will be re-installed on a later switch or unbind) and
    /// must be reported to the collector.
    pub(crate) fn shelved_values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter_map(|b| b.shelved.as_ref())
    }
}

/// Swaps a binding's shelved slot with the global-table entry for its
/// symbol.
fn swap_with_table(globals: &mut HashMap<Symbol, Value>, binding: &mut Binding) {
    let current = globals.remove(&binding.symbol);
    if let Some(value) = binding.shelved.take() {
        globals.insert(binding.symbol.clone(), value);
    }
    binding.shelved = current;
}

impl ExecGuard<'_> {
    /// Dynamically binds `symbol` to `value` in the current thread.
    ///
    /// The previous value is restored by `unbind_to` with the depth that
    /// `binding_depth` returned before this call, or by a context switch
    /// while another thread runs.
    pub fn bind(&mut self, symbol: Symbol, value: Value) {
        let tid = self.thread;
        let st = self.state();
        let crate::runtime::RuntimeState {
            threads, globals, ..
        } = st;
        let stack = threads
            .get_mut(&tid)
            .and_then(|r| r.bindings.as_mut())
            .expect("running thread has no binding stack");
        stack.bind(globals, symbol, value);
    }

    /// Depth of the current thread's binding stack.
    pub fn binding_depth(&mut self) -> usize {
        let tid = self.thread;
        self.state()
            .threads
            .get(&tid)
            .and_then(|r| r.bindings.as_ref())
            .map(|s| s.depth())
            .unwrap_or(0)
    }

    /// Unbinds the current thread's bindings down to `depth`.
    pub fn unbind_to(&mut self, depth: usize) {
        let tid = self.thread;
        let st = self.state();
        let crate::runtime::RuntimeState {
            threads, globals, ..
        } = st;
        if let Some(stack) = threads.get_mut(&tid).and_then(|r| r.bindings.as_mut()) {
            stack.unbind_to(globals, depth);
        }
    }

    /// Reads a dynamic variable as the current thread sees it.
    pub fn get_var(&mut self, symbol: &Symbol) -> Option<Value> {
        self.state().globals.get(symbol).cloned()
    }

    /// Writes a dynamic variable as the current thread sees it.
    ///
    /// If the variable is dynamically bound, this changes the innermost
    /// binding; the outer value still restores on unbind.
    pub fn set_var(&mut self, symbol: Symbol, value: Value) {
        self.state().globals.insert(symbol, value);
    }
}
