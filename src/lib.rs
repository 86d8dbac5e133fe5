//! # Asteria Runtime Core
//!
//! This crate implements the runtime value model and the standard host
//! library of the Asteria scripting language: the tagged [`Value`] system,
//! the [`Reference`] place expressions used as the calling convention, the
//! overload-resolving [`ArgumentReader`] that every host function parses its
//! arguments through, and the `std` object tree populated by the library
//! modules.
//!
//! The parser, the IR lowering and the execution engine are external
//! collaborators; they interact with this crate through [`Global`],
//! [`ReferenceStack`] and function invocation only.

pub mod binding;
pub mod error;
pub mod gc;
pub mod global;
pub mod library;
pub mod random;
pub mod reader;
pub mod reference;
pub mod stack;
pub mod value;
pub mod variable;

pub use binding::{NativeFunction, NativeTarget};
pub use error::{Result, RuntimeError};
pub use gc::GarbageCollector;
pub use global::{ApiVersion, Global, Hooks, ModuleLoader, API_VERSION_LATEST};
pub use random::RandomEngine;
pub use reader::ArgumentReader;
pub use reference::{Modifier, Reference};
pub use stack::ReferenceStack;
pub use value::{Array, Bytes, Compare, Object, Value, Vtype};
pub use variable::{Callable, FunRef, Opaque, OpaqueRef, Variable, VarRef};
