//! # Binding Generator
//!
//! Host functions are plain Rust functions in one of twelve shapes: the
//! cross product of three return kinds (a [`Reference`], a [`Value`], or
//! nothing) and four parameter lists (with or without the global context,
//! with or without the `self` reference; the argument reader is always
//! last). [`NativeFunction`] wraps any of them behind the single
//! [`Callable`] contract that the engine invokes.
//!
//! ## Invocation protocol
//! 1. An [`ArgumentReader`] is constructed from the function name and the
//!    moved reference stack.
//! 2. The target runs; depending on its shape it receives the global
//!    context and/or the moved `self` reference.
//! 3. The result is written back into `self`: a reference target replaces
//!    it outright, a value target turns it into a temporary, and a void
//!    target sets it to void.
//!
//! The definition site is captured with [`Location::caller`] when the
//! binding is created, so `describe` can report where a binding lives
//! without any macro bookkeeping.

use std::panic::Location;

use crate::error::Result;
use crate::global::Global;
use crate::reader::ArgumentReader;
use crate::reference::Reference;
use crate::stack::ReferenceStack;
use crate::value::Value;
use crate::variable::{Callable, FunRef};

/// The twelve native target shapes.
pub enum NativeTarget {
    RefGsa(fn(&Global, Reference, ArgumentReader) -> Result<Reference>),
    RefGa(fn(&Global, ArgumentReader) -> Result<Reference>),
    RefSa(fn(Reference, ArgumentReader) -> Result<Reference>),
    RefA(fn(ArgumentReader) -> Result<Reference>),
    ValGsa(fn(&Global, Reference, ArgumentReader) -> Result<Value>),
    ValGa(fn(&Global, ArgumentReader) -> Result<Value>),
    ValSa(fn(Reference, ArgumentReader) -> Result<Value>),
    ValA(fn(ArgumentReader) -> Result<Value>),
    VoidGsa(fn(&Global, Reference, ArgumentReader) -> Result<()>),
    VoidGa(fn(&Global, ArgumentReader) -> Result<()>),
    VoidSa(fn(Reference, ArgumentReader) -> Result<()>),
    VoidA(fn(ArgumentReader) -> Result<()>),
}

/// A native function bound into the `std` tree.
pub struct NativeFunction {
    name: &'static str,
    params: &'static str,
    location: &'static Location<'static>,
    target: NativeTarget,
}

impl NativeFunction {
    /// Wrap a native target. `name` is the fully qualified function name as
    /// it appears in diagnostics (`std.array.slice`); `params` is the
    /// parameter list text with optional parameters bracketed.
    #[track_caller]
    pub fn new(name: &'static str, params: &'static str, target: NativeTarget) -> FunRef {
        std::rc::Rc::new(NativeFunction {
            name,
            params,
            location: Location::caller(),
            target,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Callable for NativeFunction {
    fn describe(&self) -> String {
        format!(
            "{}({}) at '{}:{}'",
            self.name,
            self.params,
            self.location.file(),
            self.location.line()
        )
    }

    fn invoke(
        &self,
        self_ref: &mut Reference,
        global: &Global,
        stack: ReferenceStack,
    ) -> Result<()> {
        global.notify_native_call(self.name);
        let reader = ArgumentReader::new(self.name, stack);
        use NativeTarget::*;
        match self.target {
            RefGsa(f) => {
                let this = std::mem::take(self_ref);
                *self_ref = f(global, this, reader)?;
            }
            RefGa(f) => {
                *self_ref = f(global, reader)?;
            }
            RefSa(f) => {
                let this = std::mem::take(self_ref);
                *self_ref = f(this, reader)?;
            }
            RefA(f) => {
                *self_ref = f(reader)?;
            }
            ValGsa(f) => {
                let this = std::mem::take(self_ref);
                self_ref.set_temporary(f(global, this, reader)?);
            }
            ValGa(f) => {
                self_ref.set_temporary(f(global, reader)?);
            }
            ValSa(f) => {
                let this = std::mem::take(self_ref);
                self_ref.set_temporary(f(this, reader)?);
            }
            ValA(f) => {
                self_ref.set_temporary(f(reader)?);
            }
            VoidGsa(f) => {
                let this = std::mem::take(self_ref);
                f(global, this, reader)?;
                self_ref.set_void();
            }
            VoidGa(f) => {
                f(global, reader)?;
                self_ref.set_void();
            }
            VoidSa(f) => {
                let this = std::mem::take(self_ref);
                f(this, reader)?;
                self_ref.set_void();
            }
            VoidA(f) => {
                f(reader)?;
                self_ref.set_void();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::{ApiVersion, Global};

    fn add_one(mut reader: ArgumentReader) -> Result<Value> {
        reader.start_overload();
        let x = reader.required_integer()?;
        if reader.end_overload() {
            return Ok(Value::Integer(x + 1));
        }
        Err(reader.no_matching_function_call())
    }

    #[test]
    fn value_targets_produce_temporaries() {
        let global = Global::new(ApiVersion::V0001_0000);
        let fun = NativeFunction::new("test.add_one", "x", NativeTarget::ValA(add_one));

        let mut stack = ReferenceStack::new();
        stack.push().set_temporary(Value::Integer(41));
        let mut self_ref = Reference::new();
        fun.invoke(&mut self_ref, &global, stack).unwrap();
        assert_eq!(self_ref.dereference_readonly().unwrap(), Value::Integer(42));
    }

    #[test]
    fn void_targets_produce_void() {
        fn noop(mut reader: ArgumentReader) -> Result<()> {
            reader.start_overload();
            if reader.end_overload() {
                return Ok(());
            }
            Err(reader.no_matching_function_call())
        }

        let global = Global::new(ApiVersion::V0001_0000);
        let fun = NativeFunction::new("test.noop", "", NativeTarget::VoidA(noop));
        let mut self_ref = Reference::new();
        fun.invoke(&mut self_ref, &global, ReferenceStack::new()).unwrap();
        assert!(self_ref.is_void());
    }

    #[test]
    fn dispatch_failure_propagates() {
        let global = Global::new(ApiVersion::V0001_0000);
        let fun = NativeFunction::new("test.add_one", "x", NativeTarget::ValA(add_one));

        let mut stack = ReferenceStack::new();
        stack.push().set_temporary(Value::from("nope"));
        let mut self_ref = Reference::new();
        let err = fun.invoke(&mut self_ref, &global, stack).unwrap_err();
        assert!(err.to_string().contains("No matching function call"));
    }

    #[test]
    fn reference_targets_replace_self() {
        fn first_arg(mut reader: ArgumentReader) -> Result<Reference> {
            reader.start_overload();
            let arg = reader.optional_reference()?;
            if reader.end_overload() {
                return Ok(arg);
            }
            Err(reader.no_matching_function_call())
        }

        let global = Global::new(ApiVersion::V0001_0000);
        let fun = NativeFunction::new("test.first_arg", "[reference]", NativeTarget::RefA(first_arg));

        let var = crate::variable::Variable::new(Value::Integer(5));
        let mut stack = ReferenceStack::new();
        stack.push().set_variable(var.clone());
        let mut self_ref = Reference::new();
        fun.invoke(&mut self_ref, &global, stack).unwrap();

        // The result is the argument reference itself, still writable.
        self_ref
            .dereference_mutable(|v| {
                *v = Value::Integer(6);
                Ok(())
            })
            .unwrap();
        assert_eq!(var.borrow().value().clone(), Value::Integer(6));
    }

    #[test]
    fn global_self_targets_see_both() {
        fn self_plus_random(global: &Global, this: Reference, mut reader: ArgumentReader) -> Result<Value> {
            reader.start_overload();
            if reader.end_overload() {
                let base = this.dereference_readonly()?.as_integer()?;
                let _ = global.random_u32();
                return Ok(Value::Integer(base + 1));
            }
            Err(reader.no_matching_function_call())
        }

        let global = Global::new(ApiVersion::V0001_0000);
        let fun = NativeFunction::new("test.bump", "", NativeTarget::ValGsa(self_plus_random));
        let mut self_ref = Reference::new();
        self_ref.set_temporary(Value::Integer(9));
        fun.invoke(&mut self_ref, &global, ReferenceStack::new()).unwrap();
        assert_eq!(self_ref.dereference_readonly().unwrap(), Value::Integer(10));
    }

    #[test]
    fn describe_names_the_definition_site() {
        let fun = NativeFunction::new("test.f", "a, [b]", NativeTarget::ValA(add_one));
        let text = fun.describe();
        assert!(text.starts_with("test.f(a, [b]) at '"));
        assert!(text.contains("binding.rs"));
    }
}
