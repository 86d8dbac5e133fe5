//! # Global Context
//!
//! A [`Global`] is the only process-wide state surface of a running
//! interpreter: it owns the garbage collector, the random engine, the
//! module loader and the optional debug hooks, and it holds the `std`
//! object tree. No library module owns hidden singletons; anything that
//! needs randomness, collection or hooks reaches them through the context.
//!
//! ## Standard library wiring
//! The module registry is sorted by introducing API version. Construction
//! takes an API version request and initialises the registry prefix of
//! modules at or below it; each module initialiser also receives the
//! highest selected version so it can gate late additions (the file-codec
//! variants appear at `0x00020000`).
//!
//! Dropping the context performs a final garbage collection; cycles that
//! survive it are leaked deliberately.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::gc::GarbageCollector;
use crate::library;
use crate::random::RandomEngine;
use crate::value::{skey, Object, Value};

/// Standard library API versions, ordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ApiVersion {
    None = 0,
    V0001_0000 = 0x0001_0000,
    V0002_0000 = 0x0002_0000,
}

/// The highest version this build implements.
pub const API_VERSION_LATEST: ApiVersion = ApiVersion::V0002_0000;

/// Observation hooks for debugging and profiling.
pub trait Hooks {
    /// A native function is about to run.
    fn on_native_call(&self, _name: &str) {}
}

/// Detects recursive module imports. The actual file I/O of importing lives
/// with the execution engine; the runtime only tracks which paths are held
/// open.
#[derive(Default)]
pub struct ModuleLoader {
    locked: RefCell<HashSet<PathBuf>>,
}

impl ModuleLoader {
    /// Mark `path` as being loaded. Returns false when it is already held,
    /// which indicates a circular import.
    pub fn lock(&self, path: &Path) -> bool {
        self.locked.borrow_mut().insert(path.to_path_buf())
    }

    pub fn unlock(&self, path: &Path) {
        self.locked.borrow_mut().remove(path);
    }
}

struct Module {
    version: ApiVersion,
    name: &'static str,
    init: fn(&mut Object, ApiVersion),
}

// Keep this list sorted by the `version` member.
const MODULES: &[Module] = &[
    Module { version: ApiVersion::V0001_0000, name: "gc", init: library::gc::create_bindings_gc },
    Module { version: ApiVersion::V0001_0000, name: "system", init: library::system::create_bindings_system },
    Module { version: ApiVersion::V0001_0000, name: "debug", init: library::debug::create_bindings_debug },
    Module { version: ApiVersion::V0001_0000, name: "chrono", init: library::chrono::create_bindings_chrono },
    Module { version: ApiVersion::V0001_0000, name: "string", init: library::string::create_bindings_string },
    Module { version: ApiVersion::V0001_0000, name: "array", init: library::array::create_bindings_array },
    Module { version: ApiVersion::V0001_0000, name: "numeric", init: library::numeric::create_bindings_numeric },
    Module { version: ApiVersion::V0001_0000, name: "math", init: library::math::create_bindings_math },
    Module { version: ApiVersion::V0001_0000, name: "filesystem", init: library::filesystem::create_bindings_filesystem },
    Module { version: ApiVersion::V0001_0000, name: "checksum", init: library::checksum::create_bindings_checksum },
    Module { version: ApiVersion::V0001_0000, name: "json", init: library::json::create_bindings_json },
    Module { version: ApiVersion::V0001_0000, name: "zlib", init: library::zlib::create_bindings_zlib },
    Module { version: ApiVersion::V0001_0000, name: "ini", init: library::ini::create_bindings_ini },
    Module { version: ApiVersion::V0001_0000, name: "csv", init: library::csv::create_bindings_csv },
    Module { version: ApiVersion::V0002_0000, name: "rsa", init: library::rsa::create_bindings_rsa },
];

/// Shared interpreter-wide services plus the `std` object tree.
pub struct Global {
    gcoll: Rc<GarbageCollector>,
    prng: Rc<RefCell<RandomEngine>>,
    loader: Rc<ModuleLoader>,
    hooks: RefCell<Option<Rc<dyn Hooks>>>,
    std_root: Value,
}

impl Global {
    /// Create a global context with the standard library initialised
    /// according to `api_version_req`.
    pub fn new(api_version_req: ApiVersion) -> Global {
        let end = MODULES.partition_point(|m| m.version <= api_version_req);
        let selected = &MODULES[..end];
        let highest = selected.last().map_or(ApiVersion::None, |m| m.version);

        let mut ostd = Object::new();
        for module in selected {
            let slot = ostd.entry(skey(module.name)).or_insert_with(|| Value::from(Object::new()));
            (module.init)(slot.open_object(), highest);
            log::debug!("initialized standard library module `std.{}`", module.name);
        }

        Global {
            gcoll: Rc::new(GarbageCollector::new()),
            prng: Rc::new(RefCell::new(RandomEngine::new())),
            loader: Rc::new(ModuleLoader::default()),
            hooks: RefCell::new(None),
            std_root: Value::from(ostd),
        }
    }

    /// Create a context with every module this build implements.
    pub fn with_latest() -> Global {
        Global::new(API_VERSION_LATEST)
    }

    /// The highest API version supported by this build.
    pub fn max_api_version(&self) -> ApiVersion {
        MODULES.last().map_or(ApiVersion::None, |m| m.version)
    }

    pub fn garbage_collector(&self) -> &Rc<GarbageCollector> {
        &self.gcoll
    }

    pub fn module_loader(&self) -> &Rc<ModuleLoader> {
        &self.loader
    }

    /// Draw the next 32-bit word from the random engine.
    pub fn random_u32(&self) -> u32 {
        self.prng.borrow_mut().bump()
    }

    /// Replace the random engine; used by embedders and tests that need
    /// deterministic behaviour.
    pub fn set_random_engine(&self, engine: RandomEngine) {
        *self.prng.borrow_mut() = engine;
    }

    pub fn get_hooks(&self) -> Option<Rc<dyn Hooks>> {
        self.hooks.borrow().clone()
    }

    pub fn set_hooks(&self, hooks: Option<Rc<dyn Hooks>>) {
        *self.hooks.borrow_mut() = hooks;
    }

    pub(crate) fn notify_native_call(&self, name: &str) {
        if let Some(hooks) = self.hooks.borrow().as_ref() {
            hooks.on_native_call(name);
        }
    }

    /// The `std` object tree.
    pub fn std_root(&self) -> &Value {
        &self.std_root
    }

    /// Convenience lookup of `std.<module>.<name>`.
    pub fn std_member(&self, module: &str, name: &str) -> Option<Value> {
        let root = self.std_root.as_object().ok()?;
        let sub = root.get(&skey(module))?.as_object().ok()?;
        sub.get(&skey(name)).cloned()
    }
}

impl Drop for Global {
    fn drop(&mut self) {
        // Final collection; whatever survives is leaked deliberately.
        let reclaimed = self.gcoll.finalize();
        log::debug!("final garbage collection reclaimed {reclaimed} variable(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_request_selects_a_module_prefix() {
        let global = Global::new(ApiVersion::V0001_0000);
        assert!(global.std_member("array", "slice").is_some());
        assert!(global.std_member("rsa", "sign_sha256").is_none());

        let global = Global::with_latest();
        assert!(global.std_member("rsa", "sign_sha256").is_some());
    }

    #[test]
    fn file_codec_variants_gate_on_version_two() {
        let global = Global::new(ApiVersion::V0001_0000);
        assert!(global.std_member("json", "parse").is_some());
        assert!(global.std_member("json", "parse_file").is_none());

        let global = Global::with_latest();
        assert!(global.std_member("json", "parse_file").is_some());
        assert!(global.std_member("ini", "parse_file").is_some());
        assert!(global.std_member("csv", "parse_file").is_some());
    }

    #[test]
    fn module_list_is_version_sorted() {
        assert!(MODULES.windows(2).all(|w| w[0].version <= w[1].version));
    }

    #[test]
    fn std_functions_are_invocable_through_the_binding_layer() {
        use crate::reference::Reference;
        use crate::stack::ReferenceStack;

        let global = Global::with_latest();
        let sort = global.std_member("array", "sort").unwrap();
        let sort = sort.as_function().unwrap().clone();

        let mut stack = ReferenceStack::new();
        stack.push().set_temporary(Value::from(vec![
            Value::Integer(3),
            Value::Integer(1),
            Value::Integer(2),
        ]));
        let mut self_ref = Reference::new();
        sort.invoke(&mut self_ref, &global, stack).unwrap();
        let result = self_ref.dereference_readonly().unwrap();
        assert_eq!(
            result,
            Value::from(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );

        // A bad call surfaces the overload listing.
        let slice = global.std_member("array", "slice").unwrap();
        let slice = slice.as_function().unwrap().clone();
        let mut self_ref = Reference::new();
        let err = slice.invoke(&mut self_ref, &global, ReferenceStack::new()).unwrap_err();
        assert!(err.to_string().contains("list of overloads"));
        assert!(err.to_string().contains("std.array.slice(array, integer, [integer])"));
    }

    #[test]
    fn hooks_observe_native_calls() {
        use crate::reference::Reference;
        use crate::stack::ReferenceStack;
        use std::cell::Cell;

        struct Counter {
            calls: Cell<usize>,
        }
        impl Hooks for Counter {
            fn on_native_call(&self, _name: &str) {
                self.calls.set(self.calls.get() + 1);
            }
        }

        let global = Global::new(ApiVersion::V0001_0000);
        let counter = Rc::new(Counter { calls: Cell::new(0) });
        let hooks: Rc<dyn Hooks> = counter.clone();
        global.set_hooks(Some(hooks));

        let now = global.std_member("chrono", "now").unwrap();
        let now = now.as_function().unwrap().clone();
        let mut self_ref = Reference::new();
        now.invoke(&mut self_ref, &global, ReferenceStack::new()).unwrap();
        assert_eq!(counter.calls.get(), 1);

        global.set_hooks(None);
        now.invoke(&mut self_ref, &global, ReferenceStack::new()).unwrap();
        assert_eq!(counter.calls.get(), 1);
    }

    #[test]
    fn module_loader_detects_reentry() {
        let loader = ModuleLoader::default();
        let p = Path::new("/tmp/mod.ast");
        assert!(loader.lock(p));
        assert!(!loader.lock(p));
        loader.unlock(p);
        assert!(loader.lock(p));
    }
}
