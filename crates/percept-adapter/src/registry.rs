//! Adapter registry -- the adapters the service exposes, keyed by id.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::adapter::Adapter;
use crate::smart_glasses::SmartGlassesAdapter;

/// A shared, individually locked adapter.
pub type SharedAdapter = Arc<Mutex<Box<dyn Adapter>>>;

/// The adapters served by one service instance.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, SharedAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every adapter shipped with the service.
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register(SmartGlassesAdapter::new());
        registry
    }

    /// Register an adapter under its own id, replacing any previous one.
    pub fn register(&mut self, adapter: impl Adapter + 'static) -> Option<SharedAdapter> {
        let id = adapter.id().to_string();
        let adapter: Box<dyn Adapter> = Box::new(adapter);
        self.adapters.insert(id, Arc::new(Mutex::new(adapter)))
    }

    pub fn get(&self, id: &str) -> Option<SharedAdapter> {
        self.adapters.get(id).cloned()
    }

    /// Ids of all adapters, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// `{id, name, version, capabilities}` of every adapter.
    pub fn descriptors(&self) -> Vec<Value> {
        self.adapters
            .values()
            .map(|adapter| describe(&**lock_adapter(adapter)))
            .collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.ids())
            .finish()
    }
}

pub fn lock_adapter(adapter: &SharedAdapter) -> MutexGuard<'_, Box<dyn Adapter>> {
    adapter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Descriptor JSON for one adapter.
pub fn describe(adapter: &dyn Adapter) -> Value {
    json!({
        "id": adapter.id(),
        "name": adapter.name(),
        "version": adapter.version(),
        "capabilities": adapter.capabilities(),
    })
}
