//! Static table from module id to implementation.
//!
//! The host builds the catalog at compile time; nothing is resolved from strings at
//! runtime beyond a map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::contracts::Module;
use crate::manifest::ModuleDescriptor;

pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ModuleCatalog::register`].
    pub fn with<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Module> + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Module> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(module = %key, "catalog entry replaced");
        }
    }

    /// Register one shared instance handed out on every resolve.
    pub fn register_instance(&mut self, key: impl Into<String>, module: Arc<dyn Module>) {
        self.register(key, move || module.clone());
    }

    /// Instantiate the implementation for `descriptor`: by id first, then by entry point.
    pub fn resolve(&self, descriptor: &ModuleDescriptor) -> Option<Arc<dyn Module>> {
        self.factories
            .get(&descriptor.id)
            .or_else(|| self.factories.get(&descriptor.entry_point))
            .map(|factory| factory())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.keys())
            .finish()
    }
}
