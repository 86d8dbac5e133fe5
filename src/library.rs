//! # Standard Host Library
//!
//! Each submodule implements one subtree of the `std` object. Modules keep
//! a two-layer shape: plain semantic functions that take and return library
//! data types, and a `create_bindings_*` entry point that wraps them into
//! [`NativeFunction`](crate::binding::NativeFunction)s with their overload
//! cascades. The semantic layer is what the unit tests exercise.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::global::Global;
use crate::reference::Reference;
use crate::stack::ReferenceStack;
use crate::value::{Bytes, Compare, Value};
use crate::variable::FunRef;

pub mod array;
pub mod checksum;
pub mod chrono;
pub mod csv;
pub mod debug;
pub mod filesystem;
pub mod gc;
pub mod ini;
pub mod json;
pub mod math;
pub mod numeric;
pub mod rsa;
pub mod string;
pub mod system;
pub mod zlib;

/// Paths are byte strings; no encoding is assumed.
pub(crate) fn bytes_to_path(path: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(path))
}

pub(crate) fn path_to_bytes(path: &Path) -> Bytes {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

/// Invoke a script function with temporary arguments, returning its result
/// as a value.
pub(crate) fn invoke_with_values(global: &Global, func: &FunRef, args: Vec<Value>) -> Result<Value> {
    let mut stack = ReferenceStack::new();
    for arg in args {
        stack.push().set_temporary(arg);
    }
    let mut self_ref = Reference::new();
    func.invoke(&mut self_ref, global, stack)?;
    self_ref.dereference_readonly()
}

/// Three-way comparison used by the sorting and searching family.
///
/// Without a comparator this is the partial order, so NaN and mismatched
/// non-numeric tags surface as `Unordered`; the callers decide whether that
/// is an error (sorting) or a direction (bound searches). A user comparator
/// returns integer sign and its result is ranked against zero with the
/// total order, which cannot be unordered.
pub(crate) fn compare_by(
    global: &Global,
    comparator: &Option<FunRef>,
    lhs: &Value,
    rhs: &Value,
) -> Result<Compare> {
    match comparator {
        None => Ok(lhs.compare_partial(rhs)),
        Some(func) => {
            let result = invoke_with_values(global, func, vec![lhs.clone(), rhs.clone()])?;
            Ok(result.compare_total(&Value::Integer(0)))
        }
    }
}
