//! # Variable Cells and Host Object Protocols
//!
//! This module defines the three sharing protocols of the runtime:
//!
//! - [`Variable`] – the only interior-mutable cell in the value graph. A
//!   variable owns a [`Value`] and is shared through `Rc<RefCell<Variable>>`
//!   handles. Cycles in script data can only be formed through variables,
//!   which is why the garbage collector tracks variables and nothing else.
//! - [`Opaque`] – host-defined state wrapped in a value (hashers, compression
//!   streams, compiled patterns). Opaques are value-typed: when a shared
//!   handle is opened for mutation it is deep-cloned first.
//! - [`Callable`] – a function object invocable with a `self` reference, the
//!   global context and a moved reference stack.
//!
//! ## Collection protocol
//! `collect_variables` implementations feed every reachable variable handle
//! into a [`VariableCollector`]. The collector deduplicates by cell address
//! but counts every edge, which is what the collector's reachability analysis
//! needs.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::global::Global;
use crate::reference::Reference;
use crate::stack::ReferenceStack;
use crate::value::Value;

/// A mutable cell holding a single [`Value`].
#[derive(Default)]
pub struct Variable {
    value: Value,
}

/// Shared handle to a [`Variable`].
pub type VarRef = Rc<RefCell<Variable>>;

impl Variable {
    /// Create an unshared variable from an initial value.
    pub fn new(value: Value) -> VarRef {
        Rc::new(RefCell::new(Variable { value }))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Replace the stored value, returning the old one. Used by the sweep
    /// phase to break cycles without requiring exclusive handle ownership.
    pub fn take_value(&mut self) -> Value {
        std::mem::take(&mut self.value)
    }
}

/// Accumulates variable handles discovered during a traversal.
///
/// Deduplicates by cell address; the first sighting of a cell also queues it
/// so the caller can traverse into its stored value exactly once.
#[derive(Default)]
pub struct VariableCollector {
    edges: HashMap<usize, (VarRef, usize)>,
    pending: Vec<VarRef>,
}

impl VariableCollector {
    pub fn new() -> VariableCollector {
        VariableCollector::default()
    }

    /// Record one edge to `var`. Returns `true` on the first sighting.
    pub fn record(&mut self, var: &VarRef) -> bool {
        let addr = Rc::as_ptr(var) as usize;
        match self.edges.get_mut(&addr) {
            Some(slot) => {
                slot.1 += 1;
                false
            }
            None => {
                self.edges.insert(addr, (var.clone(), 1));
                self.pending.push(var.clone());
                true
            }
        }
    }

    /// Pre-mark `var` as already traversed, with zero recorded edges and
    /// without queueing it. Later sightings only bump the edge count.
    pub fn mark_traversed(&mut self, var: &VarRef) {
        let addr = Rc::as_ptr(var) as usize;
        self.edges.entry(addr).or_insert((var.clone(), 0));
    }

    /// Next cell whose stored value has not been traversed yet.
    pub fn next_pending(&mut self) -> Option<VarRef> {
        self.pending.pop()
    }

    /// Number of recorded edges to the cell at `addr`, or zero.
    pub fn edge_count(&self, addr: usize) -> usize {
        self.edges.get(&addr).map_or(0, |s| s.1)
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.edges.contains_key(&addr)
    }
}

/// Host-defined state stored inside a value.
///
/// Implementors wrap native resources such as hash states or compression
/// streams. The clone protocol makes opaques behave as if value-typed even
/// though handles are shared: `Value::open_opaque` deep-clones a handle that
/// is referenced from more than one place before mutating it.
pub trait Opaque: Any {
    /// One-line description used by `print` and diagnostics.
    fn describe(&self) -> String;

    /// Produce an independent deep copy of this object.
    fn clone_opaque(&self) -> OpaqueRef;

    /// Enumerate variables reachable from this object. Most opaques hold no
    /// script data and use the empty default.
    fn collect_variables(&self, _collector: &mut VariableCollector) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to an [`Opaque`].
pub type OpaqueRef = Rc<RefCell<dyn Opaque>>;

/// A callable host object.
///
/// The invocation protocol mirrors the engine calling convention: arguments
/// arrive on a moved [`ReferenceStack`], and the result is written back into
/// `self_ref`, which doubles as the `this` reference on entry.
pub trait Callable {
    /// Description of the shape `name(params)` with the definition site.
    fn describe(&self) -> String;

    /// Invoke the function. On success `self_ref` holds the result.
    fn invoke(
        &self,
        self_ref: &mut Reference,
        global: &Global,
        stack: ReferenceStack,
    ) -> Result<()>;

    /// Enumerate variables captured by this function, if any.
    fn collect_variables(&self, _collector: &mut VariableCollector) {}
}

/// Shared handle to a [`Callable`].
pub type FunRef = Rc<dyn Callable>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_counts_edges_and_queues_once() {
        let v = Variable::new(Value::Integer(7));
        let mut c = VariableCollector::new();
        assert!(c.record(&v));
        assert!(!c.record(&v));
        assert!(!c.record(&v));

        let addr = Rc::as_ptr(&v) as usize;
        assert_eq!(c.edge_count(addr), 3);
        assert!(c.next_pending().is_some());
        assert!(c.next_pending().is_none());
    }
}
