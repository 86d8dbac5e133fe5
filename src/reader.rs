//! # Argument Reader
//!
//! Every host function parses its arguments through an [`ArgumentReader`].
//! The reader consumes a moved [`ReferenceStack`] and resolves which of the
//! function's declared *overloads* matches the call, without ever throwing
//! during matching itself.
//!
//! ## Protocol
//! A host function body is a cascade:
//!
//! ```text
//! reader.start_overload();
//! let data = reader.required_array()?;
//! let from = reader.required_integer()?;
//! let len  = reader.optional_integer()?;
//! if reader.end_overload() { /* accepted; use the values */ }
//! // ... further overloads ...
//! return Err(reader.no_matching_function_call());
//! ```
//!
//! Each `required_*` / `optional_*` call consumes one logical parameter.
//! Mismatches flip the per-overload match flag instead of failing, so later
//! overloads can still be tried. `save_state` / `load_state` snapshot the
//! parsing position so overloads sharing a common prefix need not re-declare
//! it. `end_overload` accepts iff no mismatch occurred and the stack holds
//! exactly the declared number of arguments; the variadic forms accept any
//! number of trailing arguments past the declared ones.
//!
//! ## Matching rules
//! - A required parameter rejects a missing argument, null, and any tag
//!   other than the declared one.
//! - An optional parameter treats null (or a missing argument) as absent,
//!   and rejects only mismatched non-null tags.
//! - `optional_reference` / `optional_value` accept anything.
//! - Numeric widening: `real` parameters accept integers.
//!
//! When nothing matched, [`ArgumentReader::no_matching_function_call`]
//! produces the canonical error listing the observed argument types and all
//! overloads tried, numbered from 1 with a uniformly padded column.

use crate::error::{Result, RuntimeError};
use crate::reference::Reference;
use crate::stack::ReferenceStack;
use crate::value::{Array, Bytes, Object, Value};
use crate::variable::{FunRef, OpaqueRef};

/// Parsing position of the current overload.
#[derive(Clone, Default)]
struct State {
    params: String,
    nparams: u32,
    finish: bool,
    matched: bool,
}

/// Overload-resolving argument parser. See the module documentation.
pub struct ArgumentReader {
    name: String,
    stack: ReferenceStack,
    state: State,
    saved_states: Vec<State>,
    overloads: String,
}

impl ArgumentReader {
    /// Create a reader for the function `name` over a moved stack.
    pub fn new(name: impl Into<String>, stack: ReferenceStack) -> ArgumentReader {
        ArgumentReader {
            name: name.into(),
            stack,
            state: State::default(),
            saved_states: Vec::new(),
            overloads: String::new(),
        }
    }

    /// Base name of the enclosing function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Begin a new overload, resetting the per-overload state.
    pub fn start_overload(&mut self) {
        self.state.params.clear();
        self.state.nparams = 0;
        self.state.finish = false;
        self.state.matched = true;
    }

    /// Snapshot the parsing position into slot `index`.
    pub fn save_state(&mut self, index: usize) {
        while index >= self.saved_states.len() {
            self.saved_states.push(State::default());
        }
        self.saved_states[index] = self.state.clone();
    }

    /// Restore the parsing position from slot `index`.
    ///
    /// # Panics
    /// Panics when the slot has never been saved.
    pub fn load_state(&mut self, index: usize) {
        self.state = self.saved_states[index].clone();
    }

    fn prepare_parameter(&mut self, param: &str) {
        assert!(!self.state.finish, "current overload already ended");
        self.state.params.push_str(param);
        self.state.params.push_str(", ");
        self.state.nparams += 1;
    }

    fn terminate_parameter_list(&mut self) {
        assert!(!self.state.finish, "current overload already ended");
        self.state.finish = true;
        let trimmed = self
            .state
            .params
            .strip_suffix(", ")
            .unwrap_or(&self.state.params);
        self.overloads.push_str(trimmed);
        self.overloads.push('|');
    }

    fn mark_match_failure(&mut self) {
        self.state.matched = false;
    }

    /// The argument for the parameter just declared, if the overload is
    /// still matching and the stack holds enough arguments.
    fn peek_argument(&self) -> Option<&Reference> {
        if !self.state.matched {
            return None;
        }
        let nparams = self.state.nparams as usize;
        if nparams > self.stack.size() {
            return None;
        }
        Some(self.stack.top(self.stack.size() - nparams))
    }

    /// Accept any argument as a reference; absent arguments leave the
    /// default (uninitialized) reference.
    pub fn optional_reference(&mut self) -> Result<Reference> {
        self.prepare_parameter("[reference]");
        match self.peek_argument() {
            Some(arg) => Ok(arg.clone()),
            None => Ok(Reference::new()),
        }
    }

    /// Accept any argument as a value; absent arguments yield null.
    pub fn optional_value(&mut self) -> Result<Value> {
        self.prepare_parameter("[value]");
        match self.peek_argument() {
            Some(arg) => arg.dereference_readonly(),
            None => Ok(Value::Null),
        }
    }

    pub fn optional_boolean(&mut self) -> Result<Option<bool>> {
        self.prepare_parameter("[boolean]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_boolean() {
            Ok(b) => Ok(Some(b)),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_integer(&mut self) -> Result<Option<i64>> {
        self.prepare_parameter("[integer]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_integer() {
            Ok(i) => Ok(Some(i)),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_real(&mut self) -> Result<Option<f64>> {
        self.prepare_parameter("[real]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        if !val.is_real() {
            self.mark_match_failure();
            return Ok(None);
        }
        Ok(Some(val.as_real()?))
    }

    pub fn optional_string(&mut self) -> Result<Option<Bytes>> {
        self.prepare_parameter("[string]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_string() {
            Ok(s) => Ok(Some(s.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_opaque(&mut self) -> Result<Option<OpaqueRef>> {
        self.prepare_parameter("[opaque]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_opaque() {
            Ok(o) => Ok(Some(o.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_function(&mut self) -> Result<Option<FunRef>> {
        self.prepare_parameter("[function]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_function() {
            Ok(f) => Ok(Some(f.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_array(&mut self) -> Result<Option<Array>> {
        self.prepare_parameter("[array]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_array() {
            Ok(a) => Ok(Some(a.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn optional_object(&mut self) -> Result<Option<Object>> {
        self.prepare_parameter("[object]");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => return Ok(None),
        };
        if val.is_null() {
            return Ok(None);
        }
        match val.as_object() {
            Ok(o) => Ok(Some(o.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn required_boolean(&mut self) -> Result<bool> {
        self.prepare_parameter("boolean");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(false);
            }
        };
        match val.as_boolean() {
            Ok(b) => Ok(b),
            Err(_) => {
                self.mark_match_failure();
                Ok(false)
            }
        }
    }

    pub fn required_integer(&mut self) -> Result<i64> {
        self.prepare_parameter("integer");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(0);
            }
        };
        match val.as_integer() {
            Ok(i) => Ok(i),
            Err(_) => {
                self.mark_match_failure();
                Ok(0)
            }
        }
    }

    pub fn required_real(&mut self) -> Result<f64> {
        self.prepare_parameter("real");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(0.0);
            }
        };
        if !val.is_real() {
            self.mark_match_failure();
            return Ok(0.0);
        }
        val.as_real()
    }

    pub fn required_string(&mut self) -> Result<Bytes> {
        self.prepare_parameter("string");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(Bytes::new());
            }
        };
        match val.as_string() {
            Ok(s) => Ok(s.clone()),
            Err(_) => {
                self.mark_match_failure();
                Ok(Bytes::new())
            }
        }
    }

    pub fn required_opaque(&mut self) -> Result<Option<OpaqueRef>> {
        self.prepare_parameter("opaque");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(None);
            }
        };
        match val.as_opaque() {
            Ok(o) => Ok(Some(o.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn required_function(&mut self) -> Result<Option<FunRef>> {
        self.prepare_parameter("function");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(None);
            }
        };
        match val.as_function() {
            Ok(f) => Ok(Some(f.clone())),
            Err(_) => {
                self.mark_match_failure();
                Ok(None)
            }
        }
    }

    pub fn required_array(&mut self) -> Result<Array> {
        self.prepare_parameter("array");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(Array::new());
            }
        };
        match val.as_array() {
            Ok(a) => Ok(a.clone()),
            Err(_) => {
                self.mark_match_failure();
                Ok(Array::new())
            }
        }
    }

    pub fn required_object(&mut self) -> Result<Object> {
        self.prepare_parameter("object");
        let val = match self.peek_argument() {
            Some(arg) => arg.dereference_readonly()?,
            None => {
                self.mark_match_failure();
                return Ok(Object::new());
            }
        };
        match val.as_object() {
            Ok(o) => Ok(o.clone()),
            Err(_) => {
                self.mark_match_failure();
                Ok(Object::new())
            }
        }
    }

    /// Terminate the current overload. Accepts iff no mismatch occurred and
    /// the argument count matches the declared parameter count exactly.
    pub fn end_overload(&mut self) -> bool {
        self.terminate_parameter_list();
        if !self.state.matched {
            return false;
        }
        if self.stack.size() > self.state.nparams as usize {
            self.mark_match_failure();
            return false;
        }
        true
    }

    /// Variadic termination collecting trailing arguments as values.
    pub fn end_overload_values(&mut self) -> Result<Option<Vec<Value>>> {
        self.prepare_parameter("...");
        self.terminate_parameter_list();
        if !self.state.matched {
            return Ok(None);
        }
        // The `...` itself is not a parameter.
        let nparams = (self.state.nparams - 1) as usize;
        let mut vargs = Vec::new();
        if self.stack.size() > nparams {
            let nvargs = self.stack.size() - nparams;
            for k in (0..nvargs).rev() {
                vargs.push(self.stack.top(k).dereference_readonly()?);
            }
        }
        Ok(Some(vargs))
    }

    /// Variadic termination collecting trailing arguments as references.
    pub fn end_overload_references(&mut self) -> Result<Option<Vec<Reference>>> {
        self.prepare_parameter("...");
        self.terminate_parameter_list();
        if !self.state.matched {
            return Ok(None);
        }
        let nparams = (self.state.nparams - 1) as usize;
        let mut vargs = Vec::new();
        if self.stack.size() > nparams {
            let nvargs = self.stack.size() - nparams;
            for k in (0..nvargs).rev() {
                vargs.push(self.stack.top(k).clone());
            }
        }
        Ok(Some(vargs))
    }

    /// Compose the dispatch-failure error from the overloads tried so far.
    pub fn no_matching_function_call(&self) -> RuntimeError {
        // The observed argument list, in pushed order.
        let mut caller = String::new();
        caller.push_str(&self.name);
        caller.push('(');
        for (k, arg) in self.stack.iter().enumerate() {
            if k != 0 {
                caller.push_str(", ");
            }
            match arg.dereference_readonly() {
                Ok(val) => caller.push_str(val.type_name()),
                Err(_) => caller.push_str("<invalid>"),
            }
        }
        caller.push(')');

        // The overload listing, numbered with a uniformly padded column.
        // `overloads` is `|`-terminated, so the final split entry is empty.
        let entries: Vec<&str> = match self.overloads.is_empty() {
            true => Vec::new(),
            false => self.overloads.split('|').collect(),
        };
        let entries = &entries[..entries.len().saturating_sub(1)];
        let width = entries.len().to_string().len();

        let mut listing = String::from("[list of overloads:");
        for (k, params) in entries.iter().enumerate() {
            listing.push_str(&format!(
                "\n  {:>width$}) `{}({})`",
                k + 1,
                self.name,
                params,
                width = width
            ));
        }
        listing.push_str("\n  -- end of list of overloads]");

        RuntimeError::ArgumentDispatch(format!(
            "No matching function call for `{caller}`\n{listing}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(values: Vec<Value>) -> ReferenceStack {
        let mut stack = ReferenceStack::new();
        for v in values {
            stack.push().set_temporary(v);
        }
        stack
    }

    #[test]
    fn exact_arity_and_types_match() {
        let stack = stack_of(vec![Value::from("ab"), Value::Integer(1)]);
        let mut reader = ArgumentReader::new("f", stack);

        reader.start_overload();
        let s = reader.required_string().unwrap();
        let i = reader.required_integer().unwrap();
        assert!(reader.end_overload());
        assert_eq!(s, b"ab".to_vec());
        assert_eq!(i, 1);
    }

    #[test]
    fn excess_arguments_reject_the_overload() {
        let stack = stack_of(vec![Value::Integer(1), Value::Integer(2)]);
        let mut reader = ArgumentReader::new("f", stack);

        reader.start_overload();
        reader.required_integer().unwrap();
        assert!(!reader.end_overload());
    }

    #[test]
    fn null_is_absent_for_optional_but_wrong_for_required() {
        let stack = stack_of(vec![Value::Null]);
        let mut reader = ArgumentReader::new("f", stack);

        reader.start_overload();
        assert_eq!(reader.optional_integer().unwrap(), None);
        assert!(reader.end_overload());

        let stack = stack_of(vec![Value::Null]);
        let mut reader = ArgumentReader::new("f", stack);
        reader.start_overload();
        reader.required_integer().unwrap();
        assert!(!reader.end_overload());
    }

    #[test]
    fn real_parameters_accept_integers() {
        let stack = stack_of(vec![Value::Integer(7)]);
        let mut reader = ArgumentReader::new("f", stack);
        reader.start_overload();
        let x = reader.required_real().unwrap();
        assert!(reader.end_overload());
        assert_eq!(x, 7.0);
    }

    #[test]
    fn missing_optional_parameters_leave_defaults() {
        let stack = stack_of(vec![Value::Integer(5)]);
        let mut reader = ArgumentReader::new("f", stack);
        reader.start_overload();
        let a = reader.required_integer().unwrap();
        let b = reader.optional_integer().unwrap();
        assert!(reader.end_overload());
        assert_eq!((a, b), (5, None));
    }

    #[test]
    fn saved_states_allow_prefix_sharing() {
        let stack = stack_of(vec![Value::Integer(5), Value::from("x")]);
        let mut reader = ArgumentReader::new("f", stack);

        reader.start_overload();
        reader.required_integer().unwrap();
        reader.save_state(0);
        reader.optional_integer().unwrap();
        assert!(!reader.end_overload());

        reader.load_state(0);
        let s = reader.optional_string().unwrap();
        assert!(reader.end_overload());
        assert_eq!(s, Some(b"x".to_vec()));
    }

    #[test]
    fn variadic_tail_collects_in_pushed_order() {
        let stack = stack_of(vec![
            Value::from("t"),
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        let mut reader = ArgumentReader::new("f", stack);
        reader.start_overload();
        reader.required_string().unwrap();
        let vargs = reader.end_overload_values().unwrap().unwrap();
        assert_eq!(vargs.len(), 3);
        assert_eq!(vargs[0], Value::Integer(1));
        assert_eq!(vargs[2], Value::Integer(3));
    }

    #[test]
    fn dispatch_failure_lists_overloads_once_each() {
        let stack = stack_of(vec![Value::from("zzz")]);
        let mut reader = ArgumentReader::new("std.test.f", stack);

        reader.start_overload();
        reader.required_integer().unwrap();
        assert!(!reader.end_overload());

        reader.start_overload();
        reader.required_integer().unwrap();
        reader.optional_string().unwrap();
        assert!(!reader.end_overload());

        let msg = reader.no_matching_function_call().to_string();
        assert!(msg.contains("No matching function call for `std.test.f(string)`"));
        assert!(msg.contains("1) `std.test.f(integer)`"));
        assert!(msg.contains("2) `std.test.f(integer, [string])`"));
        assert!(msg.contains("-- end of list of overloads]"));
        assert_eq!(msg.matches("1) ").count(), 1);
    }
}
