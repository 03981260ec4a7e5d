//! Name -> executor lookup.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::builtins;
use crate::function::{FnCaps, Function};

/// Owned map of function executors keyed by canonical uppercase name.
///
/// Lookup is case-insensitive and registration is last-writer-wins, so a host
/// can shadow a builtin with its own implementation. The registry is an
/// explicit object passed to the builder and evaluator, never ambient state.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// An empty registry. Every call built against it produces `#NAME?`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the builtin catalog, operators included.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        builtins::install(&mut reg);
        reg
    }

    pub fn register(&mut self, function: Arc<dyn Function>) {
        self.functions
            .insert(function.name().to_ascii_uppercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Capability flags for `name`, if registered.
    pub fn caps(&self, name: &str) -> Option<FnCaps> {
        self.get(name).map(|f| f.caps())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("len", &self.functions.len())
            .finish()
    }
}
