//! # References
//!
//! A [`Reference`] denotes a *place*, not a value. Dereferencing resolves the
//! place to a [`Value`]; assigning through it mutates the underlying storage.
//!
//! ## Roots
//! - **Uninitialized** – accessing it fails.
//! - **Void** – the result of a statement with no value; reading it as a
//!   value fails.
//! - **Temporary** – owns a value; read-only.
//! - **Constant** – a read-only value.
//! - **Variable** – points at a mutable [`Variable`] cell.
//! - **Ptc** – a pending proper-tail-call payload. Engine-internal: host
//!   functions never observe this variant, and every reference operation
//!   rejects it.
//!
//! ## Modifiers
//! A reference carries a chain of `[index]` / `[key]` steps applied on
//! dereference. `dereference_readonly` resolves missing indices and keys to
//! null without failing; `dereference_mutable` creates missing path nodes,
//! inferring empty arrays or objects from the modifier kind. Applying a
//! modifier to a non-container value is a type mismatch either way.
//!
//! Mutable access is closure-shaped (`dereference_mutable(|value| ...)`)
//! because the storage slot lives behind the variable cell's `RefCell`; the
//! borrow must not outlive the call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Result, RuntimeError};
use crate::stack::ReferenceStack;
use crate::value::{Bytes, Value};
use crate::variable::{VariableCollector, VarRef};

/// One dereference step.
#[derive(Clone, Debug)]
pub enum Modifier {
    ArrayIndex(i64),
    ObjectKey(Bytes),
}

#[derive(Clone, Default)]
enum Root {
    #[default]
    Uninitialized,
    Void,
    Temporary(Value),
    Constant(Value),
    Variable(VarRef),
    Ptc(Rc<RefCell<ReferenceStack>>),
}

/// A place expression: a root plus a modifier chain.
#[derive(Clone, Default)]
pub struct Reference {
    root: Root,
    modifiers: Vec<Modifier>,
}

/// Resolve one readonly step. Missing elements become null; non-containers
/// reject the modifier.
fn apply_modifier_readonly(cur: &Value, modifier: &Modifier) -> Result<Value> {
    match (cur, modifier) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Array(arr), Modifier::ArrayIndex(index)) => {
            let len = arr.len() as i64;
            let mut idx = *index;
            if idx < 0 {
                idx += len;
            }
            if (idx < 0) || (idx >= len) {
                return Ok(Value::Null);
            }
            Ok(arr[idx as usize].clone())
        }
        (Value::Object(obj), Modifier::ObjectKey(key)) => {
            Ok(obj.get(key).cloned().unwrap_or(Value::Null))
        }
        (other, Modifier::ArrayIndex(_)) => Err(RuntimeError::TypeMismatch(format!(
            "integer subscript inapplicable (value had type `{}`)",
            other.type_name()
        ))),
        (other, Modifier::ObjectKey(_)) => Err(RuntimeError::TypeMismatch(format!(
            "string subscript inapplicable (value had type `{}`)",
            other.type_name()
        ))),
    }
}

/// Resolve one mutable step without creating anything; `None` when the
/// element is missing or the value is not the right container.
fn apply_modifier_existing<'a>(cur: &'a mut Value, modifier: &Modifier) -> Option<&'a mut Value> {
    match modifier {
        Modifier::ArrayIndex(index) => {
            if !cur.is_array() {
                return None;
            }
            let arr = cur.open_array();
            let len = arr.len() as i64;
            let mut idx = *index;
            if idx < 0 {
                idx += len;
            }
            if (idx < 0) || (idx >= len) {
                return None;
            }
            Some(&mut arr[idx as usize])
        }
        Modifier::ObjectKey(key) => {
            if !cur.is_object() {
                return None;
            }
            cur.open_object().get_mut(key)
        }
    }
}

/// Resolve one mutable step, creating the path node if it is missing.
fn apply_modifier_mutable<'a>(cur: &'a mut Value, modifier: &Modifier) -> Result<&'a mut Value> {
    match modifier {
        Modifier::ArrayIndex(index) => {
            if !cur.is_null() && !cur.is_array() {
                return Err(RuntimeError::TypeMismatch(format!(
                    "integer subscript inapplicable (value had type `{}`)",
                    cur.type_name()
                )));
            }
            let arr = cur.open_array();
            let len = arr.len() as i64;
            let mut idx = *index;
            if idx < 0 {
                idx += len;
            }
            if idx < 0 {
                return Err(RuntimeError::Range(format!(
                    "array subscript out of range (index `{index}`, length `{len}`)"
                )));
            }
            // Extend the array as necessary so the slot exists.
            if idx >= len {
                arr.resize(idx as usize + 1, Value::Null);
            }
            Ok(&mut arr[idx as usize])
        }
        Modifier::ObjectKey(key) => {
            if !cur.is_null() && !cur.is_object() {
                return Err(RuntimeError::TypeMismatch(format!(
                    "string subscript inapplicable (value had type `{}`)",
                    cur.type_name()
                )));
            }
            let obj = cur.open_object();
            Ok(obj.entry(key.clone()).or_insert(Value::Null))
        }
    }
}

impl Reference {
    pub fn new() -> Reference {
        Reference::default()
    }

    /// Reset to the uninitialized state.
    pub fn clear(&mut self) -> &mut Reference {
        self.root = Root::Uninitialized;
        self.modifiers.clear();
        self
    }

    /// Mark as the result of a valueless operation.
    pub fn set_void(&mut self) -> &mut Reference {
        self.root = Root::Void;
        self.modifiers.clear();
        self
    }

    /// Assign a temporary payload, clearing modifiers.
    pub fn set_temporary(&mut self, value: impl Into<Value>) -> &mut Reference {
        self.root = Root::Temporary(value.into());
        self.modifiers.clear();
        self
    }

    /// Assign a read-only constant, clearing modifiers.
    pub fn set_constant(&mut self, value: impl Into<Value>) -> &mut Reference {
        self.root = Root::Constant(value.into());
        self.modifiers.clear();
        self
    }

    /// Point at a variable cell, clearing modifiers.
    pub fn set_variable(&mut self, var: VarRef) -> &mut Reference {
        self.root = Root::Variable(var);
        self.modifiers.clear();
        self
    }

    /// Store a pending tail-call payload. Engine-internal.
    pub fn set_ptc_arguments(&mut self, args: ReferenceStack) -> &mut Reference {
        self.root = Root::Ptc(Rc::new(RefCell::new(args)));
        self.modifiers.clear();
        self
    }

    pub fn is_uninitialized(&self) -> bool {
        matches!(self.root, Root::Uninitialized)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.root, Root::Void)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.root, Root::Variable(_))
    }

    pub fn is_ptc(&self) -> bool {
        matches!(self.root, Root::Ptc(_))
    }

    pub fn push_modifier_array_index(&mut self, index: i64) -> &mut Reference {
        self.modifiers.push(Modifier::ArrayIndex(index));
        self
    }

    pub fn push_modifier_object_key(&mut self, key: impl Into<Bytes>) -> &mut Reference {
        self.modifiers.push(Modifier::ObjectKey(key.into()));
        self
    }

    pub fn pop_modifier(&mut self) -> &mut Reference {
        self.modifiers.pop();
        self
    }

    fn root_error(&self) -> RuntimeError {
        match self.root {
            Root::Uninitialized => {
                RuntimeError::Invariant("attempt to use an uninitialized reference".to_string())
            }
            Root::Void => RuntimeError::Invariant(
                "attempt to use the result of a function call which returned no value".to_string(),
            ),
            Root::Ptc(_) => RuntimeError::Invariant(
                "attempt to use a pending tail call as a value".to_string(),
            ),
            _ => RuntimeError::Invariant("invalid reference state".to_string()),
        }
    }

    /// Read the value this reference designates, following the modifier
    /// chain. Missing elements resolve to null.
    pub fn dereference_readonly(&self) -> Result<Value> {
        let mut cur = match &self.root {
            Root::Temporary(v) | Root::Constant(v) => v.clone(),
            Root::Variable(var) => var.borrow().value().clone(),
            _ => return Err(self.root_error()),
        };
        for modifier in &self.modifiers {
            cur = apply_modifier_readonly(&cur, modifier)?;
        }
        Ok(cur)
    }

    /// Open the designated storage slot for mutation. Only variables are
    /// mutable; missing path nodes are created as empty arrays or objects
    /// inferred from the modifier kind.
    pub fn dereference_mutable<R>(&self, f: impl FnOnce(&mut Value) -> Result<R>) -> Result<R> {
        let var = match &self.root {
            Root::Variable(var) => var,
            Root::Temporary(_) => {
                return Err(RuntimeError::TypeMismatch(
                    "attempt to modify a temporary value".to_string(),
                ))
            }
            Root::Constant(_) => {
                return Err(RuntimeError::TypeMismatch(
                    "attempt to modify a constant".to_string(),
                ))
            }
            _ => return Err(self.root_error()),
        };
        let mut guard = var.borrow_mut();
        let mut cur: &mut Value = guard.value_mut();
        for modifier in &self.modifiers {
            cur = apply_modifier_mutable(cur, modifier)?;
        }
        f(cur)
    }

    /// Remove the element designated by the final modifier and return its
    /// old value, or null if it does not exist. The path up to the final
    /// modifier is not created when missing.
    pub fn unset(&self) -> Result<Value> {
        let var = match &self.root {
            Root::Variable(var) => var,
            Root::Temporary(_) | Root::Constant(_) => {
                return Err(RuntimeError::TypeMismatch(
                    "attempt to modify a read-only value".to_string(),
                ))
            }
            _ => return Err(self.root_error()),
        };
        let last = match self.modifiers.last() {
            Some(m) => m,
            None => {
                return Err(RuntimeError::Invariant(
                    "only elements of a container can be unset".to_string(),
                ))
            }
        };
        let mut guard = var.borrow_mut();
        let mut cur: &mut Value = guard.value_mut();
        for modifier in &self.modifiers[..self.modifiers.len() - 1] {
            match apply_modifier_existing(cur, modifier) {
                Some(slot) => cur = slot,
                None => return Ok(Value::Null),
            }
        }
        match last {
            Modifier::ArrayIndex(index) => {
                if !cur.is_array() {
                    return Ok(Value::Null);
                }
                let arr = cur.open_array();
                let len = arr.len() as i64;
                let mut idx = *index;
                if idx < 0 {
                    idx += len;
                }
                if (idx < 0) || (idx >= len) {
                    return Ok(Value::Null);
                }
                Ok(arr.remove(idx as usize))
            }
            Modifier::ObjectKey(key) => {
                if !cur.is_object() {
                    return Ok(Value::Null);
                }
                Ok(cur
                    .open_object()
                    .shift_remove(key)
                    .unwrap_or(Value::Null))
            }
        }
    }

    /// Enumerate variables reachable from this reference.
    pub fn collect_variables(&self, collector: &mut VariableCollector) {
        match &self.root {
            Root::Variable(var) => {
                collector.record(var);
            }
            Root::Temporary(v) | Root::Constant(v) => v.collect_variables(collector),
            Root::Ptc(args) => {
                for r in args.borrow().iter() {
                    r.collect_variables(collector);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::skey;
    use crate::variable::Variable;

    #[test]
    fn uninitialized_and_void_reject_reads() {
        let r = Reference::new();
        assert!(r.dereference_readonly().is_err());

        let mut r = Reference::new();
        r.set_void();
        assert!(r.dereference_readonly().is_err());
    }

    #[test]
    fn temporaries_are_readable_but_not_writable() {
        let mut r = Reference::new();
        r.set_temporary(Value::Integer(42));
        assert_eq!(r.dereference_readonly().unwrap(), Value::Integer(42));
        assert!(r.dereference_mutable(|_| Ok(())).is_err());
    }

    #[test]
    fn missing_elements_read_as_null() {
        let mut r = Reference::new();
        r.set_temporary(Value::from(vec![Value::Integer(1)]));
        r.push_modifier_array_index(5);
        assert_eq!(r.dereference_readonly().unwrap(), Value::Null);

        let mut r = Reference::new();
        r.set_temporary(Value::from(crate::value::Object::new()));
        r.push_modifier_object_key(skey("absent"));
        assert_eq!(r.dereference_readonly().unwrap(), Value::Null);
    }

    #[test]
    fn negative_indices_wrap_from_the_end() {
        let mut r = Reference::new();
        r.set_temporary(Value::from(vec![Value::Integer(1), Value::Integer(2)]));
        r.push_modifier_array_index(-1);
        assert_eq!(r.dereference_readonly().unwrap(), Value::Integer(2));
    }

    #[test]
    fn modifier_on_non_container_fails() {
        let mut r = Reference::new();
        r.set_temporary(Value::Integer(9));
        r.push_modifier_array_index(0);
        assert!(r.dereference_readonly().is_err());
    }

    #[test]
    fn mutable_dereference_creates_missing_nodes() {
        let var = Variable::new(Value::Null);
        let mut r = Reference::new();
        r.set_variable(var.clone());
        r.push_modifier_object_key(skey("a"));
        r.push_modifier_array_index(2);
        r.dereference_mutable(|slot| {
            *slot = Value::Integer(7);
            Ok(())
        })
        .unwrap();

        let stored = var.borrow().value().clone();
        let obj = stored.as_object().unwrap().clone();
        let inner = obj.get(&skey("a")).unwrap().as_array().unwrap().clone();
        assert_eq!(inner.len(), 3);
        assert_eq!(inner[2], Value::Integer(7));
        assert_eq!(inner[0], Value::Null);
    }

    #[test]
    fn unset_removes_and_returns_the_old_element() {
        let mut obj = crate::value::Object::new();
        obj.insert(skey("k"), Value::Integer(3));
        let var = Variable::new(Value::from(obj));
        let mut r = Reference::new();
        r.set_variable(var.clone());
        r.push_modifier_object_key(skey("k"));
        assert_eq!(r.unset().unwrap(), Value::Integer(3));
        assert_eq!(r.unset().unwrap(), Value::Null);
        assert!(var.borrow().value().as_object().unwrap().is_empty());
    }
}
