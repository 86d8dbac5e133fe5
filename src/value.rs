//! # Value Representation for the Asteria Runtime
//!
//! This module defines [`Value`], the dynamically-typed unit of data used on
//! reference stacks, in variables, and throughout the host library.
//!
//! ## Supported types
//! - `Null` – absent / default
//! - `Boolean(bool)` – truth values
//! - `Integer(i64)` – 64-bit signed two's-complement integers
//! - `Real(f64)` – IEEE-754 binary64
//! - `String(Rc<Bytes>)` – immutable shared byte sequence; arbitrary bytes
//!   are permitted, UTF-8 is not assumed
//! - `Opaque(OpaqueRef)` – shared host object (hasher, stream, pattern)
//! - `Function(FunRef)` – shared callable host object
//! - `Array(Rc<Array>)` – shared ordered sequence of values
//! - `Object(Rc<Object>)` – shared insertion-ordered string-keyed map
//!
//! ## Design
//! - Heap variants are reference-counted handles, so copying a value is
//!   cheap. The `open_*` accessors use `Rc::make_mut` to mutate in place
//!   when the handle is unique and to clone the interior first when it is
//!   shared. Opaques deep-clone through [`Opaque::clone_opaque`].
//! - Comparison comes in two flavours. `compare_total` orders every pair of
//!   values: numbers compare numerically across the integer/real divide,
//!   NaN sorts after every other real (two NaNs are equal), and mismatched
//!   non-numeric tags fall back to a fixed tag rank. `compare_partial`
//!   yields `Unordered` for NaN or mismatched tags instead.
//! - `print_to` produces a one-line human-readable form; `dump_to` produces
//!   a typed, indented form. Both detect cycles by handle address, printing
//!   `[...]` / `{...}` instead of recursing forever.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{Result, RuntimeError};
use crate::variable::{Callable, FunRef, Opaque, OpaqueRef, VariableCollector};

/// Owned byte-string payload.
pub type Bytes = Vec<u8>;

/// Owned array payload.
pub type Array = Vec<Value>;

/// Owned object payload; insertion order is preserved.
pub type Object = IndexMap<Bytes, Value>;

/// Variant tag of a [`Value`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Vtype {
    Null,
    Boolean,
    Integer,
    Real,
    String,
    Opaque,
    Function,
    Array,
    Object,
}

impl Vtype {
    /// Lower-case tag name as it appears in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Vtype::Null => "null",
            Vtype::Boolean => "boolean",
            Vtype::Integer => "integer",
            Vtype::Real => "real",
            Vtype::String => "string",
            Vtype::Opaque => "opaque",
            Vtype::Function => "function",
            Vtype::Array => "array",
            Vtype::Object => "object",
        }
    }
}

/// Result of a three-way comparison.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compare {
    Unordered,
    Less,
    Equal,
    Greater,
}

/// Value type for reference stacks, variables and library data.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Rc<Bytes>),
    Opaque(OpaqueRef),
    Function(FunRef),
    Array(Rc<Array>),
    Object(Rc<Object>),
}

/// Compare an exact integer with a real without rounding the integer.
fn cmp_integer_real(i: i64, r: f64) -> Compare {
    if r.is_nan() {
        // NaN sorts after every other real in the total order.
        return Compare::Less;
    }
    if r == f64::INFINITY {
        return Compare::Less;
    }
    if r == f64::NEG_INFINITY {
        return Compare::Greater;
    }
    let rf = r.floor();
    if rf >= 9.223_372_036_854_776e18 {
        return Compare::Less;
    }
    if rf < -9.223_372_036_854_776e18 {
        return Compare::Greater;
    }
    let ri = rf as i64;
    if i < ri {
        Compare::Less
    } else if i > ri {
        Compare::Greater
    } else if r > rf {
        // Equal integral parts but `r` has a fractional part.
        Compare::Less
    } else {
        Compare::Equal
    }
}

fn cmp_reals_total(a: f64, b: f64) -> Compare {
    if a < b {
        Compare::Less
    } else if a > b {
        Compare::Greater
    } else if a == b {
        Compare::Equal
    } else if a.is_nan() && b.is_nan() {
        Compare::Equal
    } else if a.is_nan() {
        Compare::Greater
    } else {
        Compare::Less
    }
}

fn invert(cmp: Compare) -> Compare {
    match cmp {
        Compare::Less => Compare::Greater,
        Compare::Greater => Compare::Less,
        other => other,
    }
}

/// Render a real the way the runtime prints numbers: shortest decimal form
/// that round-trips, with the specials spelled out.
pub(crate) fn format_real(r: f64) -> String {
    if r.is_nan() {
        "nan".to_string()
    } else if r == f64::INFINITY {
        "infinity".to_string()
    } else if r == f64::NEG_INFINITY {
        "-infinity".to_string()
    } else {
        format!("{r:?}")
    }
}

/// Append `data` to `out`, quoting and escaping it as a string literal.
fn print_quoted(out: &mut String, data: &[u8]) {
    out.push('"');
    for &b in data {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E | 0x80..=0xFF => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02X}")),
        }
    }
    out.push('"');
}

impl Value {
    pub fn vtype(&self) -> Vtype {
        match self {
            Value::Null => Vtype::Null,
            Value::Boolean(_) => Vtype::Boolean,
            Value::Integer(_) => Vtype::Integer,
            Value::Real(_) => Vtype::Real,
            Value::String(_) => Vtype::String,
            Value::Opaque(_) => Vtype::Opaque,
            Value::Function(_) => Vtype::Function,
            Value::Array(_) => Vtype::Array,
            Value::Object(_) => Vtype::Object,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.vtype().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// Integers are also reals: numeric parameters widen implicitly.
    pub fn is_real(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Value::Opaque(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    fn type_error(&self, want: &str) -> RuntimeError {
        RuntimeError::TypeMismatch(format!(
            "value is not {want} (value had type `{}`)",
            self.type_name()
        ))
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.type_error("a boolean")),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            _ => Err(self.type_error("an integer")),
        }
    }

    /// Read as a real, widening integers.
    pub fn as_real(&self) -> Result<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Real(r) => Ok(*r),
            _ => Err(self.type_error("a real")),
        }
    }

    pub fn as_string(&self) -> Result<&Bytes> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self.type_error("a string")),
        }
    }

    pub fn as_opaque(&self) -> Result<&OpaqueRef> {
        match self {
            Value::Opaque(o) => Ok(o),
            _ => Err(self.type_error("an opaque")),
        }
    }

    pub fn as_function(&self) -> Result<&FunRef> {
        match self {
            Value::Function(f) => Ok(f),
            _ => Err(self.type_error("a function")),
        }
    }

    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self.type_error("an array")),
        }
    }

    pub fn as_object(&self) -> Result<&Object> {
        match self {
            Value::Object(o) => Ok(o),
            _ => Err(self.type_error("an object")),
        }
    }

    /// Open the value as a mutable string, coercing other tags to an empty
    /// string first. A shared handle is cloned before mutation.
    pub fn open_string(&mut self) -> &mut Bytes {
        if !matches!(self, Value::String(_)) {
            *self = Value::String(Rc::new(Bytes::new()));
        }
        match self {
            Value::String(s) => Rc::make_mut(s),
            _ => unreachable!(),
        }
    }

    /// Open the value as a mutable array; see [`Value::open_string`].
    pub fn open_array(&mut self) -> &mut Array {
        if !matches!(self, Value::Array(_)) {
            *self = Value::Array(Rc::new(Array::new()));
        }
        match self {
            Value::Array(a) => Rc::make_mut(a),
            _ => unreachable!(),
        }
    }

    /// Open the value as a mutable object; see [`Value::open_string`].
    pub fn open_object(&mut self) -> &mut Object {
        if !matches!(self, Value::Object(_)) {
            *self = Value::Object(Rc::new(Object::new()));
        }
        match self {
            Value::Object(o) => Rc::make_mut(o),
            _ => unreachable!(),
        }
    }

    pub fn open_real(&mut self) -> &mut f64 {
        if !matches!(self, Value::Real(_)) {
            *self = Value::Real(0.0);
        }
        match self {
            Value::Real(r) => r,
            _ => unreachable!(),
        }
    }

    pub fn open_integer(&mut self) -> &mut i64 {
        if !matches!(self, Value::Integer(_)) {
            *self = Value::Integer(0);
        }
        match self {
            Value::Integer(i) => i,
            _ => unreachable!(),
        }
    }

    /// Obtain an exclusively-owned opaque handle, deep-cloning a shared one
    /// first. The value must already hold an opaque.
    pub fn open_opaque(&mut self) -> Result<&OpaqueRef> {
        match self {
            Value::Opaque(o) => {
                if Rc::strong_count(o) > 1 {
                    let fresh = o.borrow().clone_opaque();
                    *o = fresh;
                }
                Ok(o)
            }
            _ => Err(self.type_error("an opaque")),
        }
    }

    /// Truth test used by predicates: null and `false` are false, everything
    /// else is true.
    pub fn test(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    /// Total three-way comparison; every pair of values is ordered.
    pub fn compare_total(&self, other: &Value) -> Compare {
        self.do_compare(other, true)
    }

    /// Partial three-way comparison; NaN and mismatched tags are unordered.
    pub fn compare_partial(&self, other: &Value) -> Compare {
        self.do_compare(other, false)
    }

    fn do_compare(&self, other: &Value, total: bool) -> Compare {
        use Value::*;
        match (self, other) {
            (Null, Null) => Compare::Equal,
            (Boolean(a), Boolean(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Integer(a), Integer(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Real(a), Real(b)) => {
                if !total && (a.is_nan() || b.is_nan()) {
                    return Compare::Unordered;
                }
                cmp_reals_total(*a, *b)
            }
            (Integer(a), Real(b)) => {
                if !total && b.is_nan() {
                    return Compare::Unordered;
                }
                cmp_integer_real(*a, *b)
            }
            (Real(a), Integer(b)) => {
                if !total && a.is_nan() {
                    return Compare::Unordered;
                }
                invert(cmp_integer_real(*b, *a))
            }
            (String(a), String(b)) => match a.as_slice().cmp(b.as_slice()) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.do_compare(y, total) {
                        Compare::Equal => continue,
                        other => return other,
                    }
                }
                match a.len().cmp(&b.len()) {
                    std::cmp::Ordering::Less => Compare::Less,
                    std::cmp::Ordering::Equal => Compare::Equal,
                    std::cmp::Ordering::Greater => Compare::Greater,
                }
            }
            (Opaque(a), Opaque(b)) => Self::cmp_handles(Rc::as_ptr(a) as *const u8 as usize,
                                                        Rc::as_ptr(b) as *const u8 as usize, total),
            (Function(a), Function(b)) => Self::cmp_handles(Rc::as_ptr(a) as *const u8 as usize,
                                                            Rc::as_ptr(b) as *const u8 as usize, total),
            (Object(a), Object(b)) => Self::cmp_handles(Rc::as_ptr(a) as usize,
                                                        Rc::as_ptr(b) as usize, total),
            _ => {
                if !total {
                    return Compare::Unordered;
                }
                match self.tag_rank().cmp(&other.tag_rank()) {
                    std::cmp::Ordering::Less => Compare::Less,
                    std::cmp::Ordering::Equal => Compare::Equal,
                    std::cmp::Ordering::Greater => Compare::Greater,
                }
            }
        }
    }

    /// Identity comparison for types that have no structural order. The
    /// total order falls back to handle addresses, which is stable for the
    /// lifetime of the handles.
    fn cmp_handles(a: usize, b: usize, total: bool) -> Compare {
        if a == b {
            Compare::Equal
        } else if !total {
            Compare::Unordered
        } else if a < b {
            Compare::Less
        } else {
            Compare::Greater
        }
    }

    /// Rank used to order mismatched tags in total mode. Integer and real
    /// share a rank; those pairs are compared numerically instead.
    fn tag_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Real(_) => 2,
            Value::String(_) => 3,
            Value::Opaque(_) => 4,
            Value::Function(_) => 5,
            Value::Array(_) => 6,
            Value::Object(_) => 7,
        }
    }

    /// Append a one-line human-readable form to `out`. Not round-trippable.
    pub fn print_to(&self, out: &mut String) {
        let mut seen = HashSet::new();
        self.do_print(out, &mut seen);
    }

    /// Convenience wrapper over [`Value::print_to`].
    pub fn print_to_string(&self) -> String {
        let mut out = String::new();
        self.print_to(&mut out);
        out
    }

    fn do_print(&self, out: &mut String, seen: &mut HashSet<usize>) {
        match self {
            Value::Null => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Integer(i) => out.push_str(&i.to_string()),
            Value::Real(r) => out.push_str(&format_real(*r)),
            Value::String(s) => print_quoted(out, s),
            Value::Opaque(o) => out.push_str(&format!("(opaque) [[`{}`]]", o.borrow().describe())),
            Value::Function(f) => out.push_str(&format!("(function) [[`{}`]]", f.describe())),
            Value::Array(a) => {
                let ptr = Rc::as_ptr(a) as usize;
                if !seen.insert(ptr) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                for (k, v) in a.iter().enumerate() {
                    if k != 0 {
                        out.push_str(", ");
                    }
                    v.do_print(out, seen);
                }
                out.push(']');
                seen.remove(&ptr);
            }
            Value::Object(o) => {
                let ptr = Rc::as_ptr(o) as usize;
                if !seen.insert(ptr) {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (k, (key, v)) in o.iter().enumerate() {
                    if k != 0 {
                        out.push_str(", ");
                    }
                    print_quoted(out, key);
                    out.push_str(": ");
                    v.do_print(out, seen);
                }
                out.push('}');
                seen.remove(&ptr);
            }
        }
    }

    /// Append a typed, possibly multi-line form to `out`. Each nesting level
    /// is indented by `indent` spaces; zero produces a single line.
    pub fn dump_to(&self, out: &mut String, indent: usize) {
        let mut seen = HashSet::new();
        self.do_dump(out, indent, 0, &mut seen);
    }

    fn do_dump(&self, out: &mut String, indent: usize, depth: usize, seen: &mut HashSet<usize>) {
        let do_break = |out: &mut String, depth: usize| {
            if indent != 0 {
                out.push('\n');
                out.push_str(&" ".repeat(indent * depth));
            } else {
                out.push(' ');
            }
        };
        match self {
            Value::Null => out.push_str("null"),
            Value::Boolean(b) => out.push_str(&format!("boolean {b}")),
            Value::Integer(i) => out.push_str(&format!("integer {i}")),
            Value::Real(r) => out.push_str(&format!("real {}", format_real(*r))),
            Value::String(s) => {
                out.push_str(&format!("string({}) ", s.len()));
                print_quoted(out, s);
            }
            Value::Opaque(o) => out.push_str(&format!("opaque [[`{}`]]", o.borrow().describe())),
            Value::Function(f) => out.push_str(&format!("function [[`{}`]]", f.describe())),
            Value::Array(a) => {
                let ptr = Rc::as_ptr(a) as usize;
                if !seen.insert(ptr) {
                    out.push_str("array [...]");
                    return;
                }
                out.push_str(&format!("array({}) [", a.len()));
                for (k, v) in a.iter().enumerate() {
                    do_break(out, depth + 1);
                    out.push_str(&format!("{k} = "));
                    v.do_dump(out, indent, depth + 1, seen);
                    out.push(';');
                }
                do_break(out, depth);
                out.push(']');
                seen.remove(&ptr);
            }
            Value::Object(o) => {
                let ptr = Rc::as_ptr(o) as usize;
                if !seen.insert(ptr) {
                    out.push_str("object {...}");
                    return;
                }
                out.push_str(&format!("object({}) {{", o.len()));
                for (key, v) in o.iter() {
                    do_break(out, depth + 1);
                    print_quoted(out, key);
                    out.push_str(" = ");
                    v.do_dump(out, indent, depth + 1, seen);
                    out.push(';');
                }
                do_break(out, depth);
                out.push('}');
                seen.remove(&ptr);
            }
        }
    }

    /// Enumerate variable cells reachable from this value.
    pub fn collect_variables(&self, collector: &mut VariableCollector) {
        match self {
            Value::Array(a) => {
                for v in a.iter() {
                    v.collect_variables(collector);
                }
            }
            Value::Object(o) => {
                for v in o.values() {
                    v.collect_variables(collector);
                }
            }
            Value::Opaque(o) => o.borrow().collect_variables(collector),
            Value::Function(f) => f.collect_variables(collector),
            _ => {}
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print_to_string())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print_to_string())
    }
}

impl PartialEq for Value {
    /// Structural equality in the partial-comparison sense.
    fn eq(&self, other: &Value) -> bool {
        self.compare_partial(other) == Compare::Equal
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Value {
        Value::Real(r)
    }
}

impl From<Bytes> for Value {
    fn from(s: Bytes) -> Value {
        Value::String(Rc::new(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(Rc::new(s.as_bytes().to_vec()))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Value {
        Value::Array(Rc::new(a))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Value {
        Value::Object(Rc::new(o))
    }
}

impl From<FunRef> for Value {
    fn from(f: FunRef) -> Value {
        Value::Function(f)
    }
}

impl From<OpaqueRef> for Value {
    fn from(o: OpaqueRef) -> Value {
        Value::Opaque(o)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(opt: Option<T>) -> Value {
        match opt {
            Some(v) => Value::from(v),
            None => Value::Null,
        }
    }
}

/// Make an object key from a literal.
pub fn skey(s: &str) -> Bytes {
    s.as_bytes().to_vec()
}

/// Wrap a concrete opaque into a shared handle.
pub fn make_opaque<T: Opaque>(obj: T) -> OpaqueRef {
    Rc::new(RefCell::new(obj))
}

/// Wrap a concrete callable into a shared handle.
pub fn make_function<T: Callable + 'static>(obj: T) -> FunRef {
    Rc::new(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_reals_compare_numerically() {
        assert_eq!(Value::Integer(1).compare_total(&Value::Real(1.0)), Compare::Equal);
        assert_eq!(Value::Integer(1).compare_total(&Value::Real(1.5)), Compare::Less);
        assert_eq!(Value::Real(2.5).compare_total(&Value::Integer(2)), Compare::Greater);
        assert_eq!(Value::Integer(i64::MAX).compare_total(&Value::Real(9.3e18)), Compare::Less);
        assert_eq!(
            Value::Integer(i64::MIN).compare_total(&Value::Real(f64::NEG_INFINITY)),
            Compare::Greater
        );
    }

    #[test]
    fn nan_is_total_but_not_partial() {
        let nan = Value::Real(f64::NAN);
        assert_eq!(nan.compare_total(&nan), Compare::Equal);
        assert_eq!(nan.compare_partial(&nan), Compare::Unordered);
        assert_eq!(Value::Real(1.0).compare_partial(&nan), Compare::Unordered);
        assert_eq!(Value::Real(1.0).compare_total(&nan), Compare::Less);
    }

    #[test]
    fn mismatched_tags_rank_in_total_mode_only() {
        let s = Value::from("x");
        let i = Value::Integer(3);
        assert_eq!(i.compare_total(&s), Compare::Less);
        assert_eq!(s.compare_total(&i), Compare::Greater);
        assert_eq!(i.compare_partial(&s), Compare::Unordered);
    }

    #[test]
    fn string_comparison_is_bytewise() {
        let a = Value::from(vec![0x00u8, 0xFF]);
        let b = Value::from(vec![0x01u8]);
        assert_eq!(a.compare_total(&b), Compare::Less);
        assert_eq!(a.compare_partial(&a), Compare::Equal);
    }

    #[test]
    fn arrays_compare_elementwise() {
        let a = Value::from(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::from(vec![Value::Integer(1), Value::Integer(3)]);
        let c = Value::from(vec![Value::Integer(1)]);
        assert_eq!(a.compare_total(&b), Compare::Less);
        assert_eq!(a.compare_total(&c), Compare::Greater);
        assert_eq!(a.compare_partial(&a.clone()), Compare::Equal);
    }

    #[test]
    fn open_accessors_clone_shared_interiors() {
        let shared = Value::from(vec![Value::Integer(1)]);
        let mut copy = shared.clone();
        copy.open_array().push(Value::Integer(2));
        assert_eq!(shared.as_array().unwrap().len(), 1);
        assert_eq!(copy.as_array().unwrap().len(), 2);
    }

    #[test]
    fn open_accessors_coerce_other_tags() {
        let mut v = Value::Null;
        v.open_array().push(Value::Integer(1));
        assert!(v.is_array());

        let mut v = Value::Integer(9);
        v.open_object().insert(skey("k"), Value::Null);
        assert!(v.is_object());
    }

    #[test]
    fn print_forms() {
        assert_eq!(Value::Null.print_to_string(), "null");
        assert_eq!(Value::Integer(42).print_to_string(), "42");
        assert_eq!(Value::Real(42.5).print_to_string(), "42.5");
        assert_eq!(Value::Real(f64::INFINITY).print_to_string(), "infinity");
        assert_eq!(Value::from("hi\n").print_to_string(), "\"hi\\n\"");
        let arr = Value::from(vec![Value::Integer(1), Value::from("two")]);
        assert_eq!(arr.print_to_string(), "[1, \"two\"]");
    }

    #[test]
    fn dump_is_typed() {
        let mut obj = Object::new();
        obj.insert(skey("a"), Value::Integer(1));
        let v = Value::from(obj);
        let mut s = String::new();
        v.dump_to(&mut s, 2);
        assert!(s.starts_with("object(1) {"));
        assert!(s.contains("\"a\" = integer 1;"));
    }
}
