//! Module registry -- the id -> factory table that plugins register into.
//!
//! The host owns the registry and hands it to the [`super::PluginLoader`];
//! loading a module's entry script registers its factory here, and the host
//! then asks the registry for a fresh instance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::trait_def::TrainingModule;

/// Produces a fresh module instance on every call.
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn TrainingModule> + Send + Sync>;

/// A collection of module factories, keyed by module id.
///
/// # Example
///
/// ```ignore
/// let registry = ModuleRegistry::new();
/// registry.register("vision-basic", Arc::new(|| Box::new(VisionModule::new()) as Box<dyn TrainingModule>));
/// let instance = registry.create("vision-basic").unwrap();
/// ```
#[derive(Default)]
pub struct ModuleRegistry {
    factories: RwLock<HashMap<String, ModuleFactory>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `id`.
    ///
    /// The last registration wins: a factory already stored under the same
    /// id is replaced and returned.
    pub fn register(&self, id: impl Into<String>, factory: ModuleFactory) -> Option<ModuleFactory> {
        let id = id.into();
        tracing::debug!(module_id = %id, "registering module factory");
        match self.factories.write() {
            Ok(mut factories) => factories.insert(id, factory),
            Err(poisoned) => poisoned.into_inner().insert(id, factory),
        }
    }

    /// Create a fresh instance of the module registered under `id`.
    ///
    /// Returns `None` for ids nobody registered.
    pub fn create(&self, id: &str) -> Option<Box<dyn TrainingModule>> {
        let factory = self.factory(id)?;
        Some(factory())
    }

    /// Return `true` if a factory is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.factory(id).is_some()
    }

    /// List the ids of all registered modules, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.factories.read() {
            Ok(factories) => factories.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        ids.sort();
        ids
    }

    /// Return the number of registered modules.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Return `true` if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn factory(&self, id: &str) -> Option<ModuleFactory> {
        // The factory is cloned out so it runs without the lock held; a
        // factory may itself touch the registry.
        match self.factories.read() {
            Ok(factories) => factories.get(id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(id).cloned(),
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::container::ModuleContainer;
    use crate::module::trait_def::CompletionCallback;
    use crate::module::types::TaskParams;

    /// Minimal module that writes its label when rendered.
    struct LabelModule {
        label: &'static str,
    }

    impl TrainingModule for LabelModule {
        fn render(&mut self, container: ModuleContainer, _params: &TaskParams, _on_complete: CompletionCallback) {
            container.write_line(self.label);
        }

        fn cleanup(&mut self) {}
    }

    fn factory(label: &'static str) -> ModuleFactory {
        Arc::new(move || Box::new(LabelModule { label }) as Box<dyn TrainingModule>)
    }

    fn render_label(module: &mut Box<dyn TrainingModule>) -> Vec<String> {
        let (c, handle) = crate::module::container::container();
        module.render(c, &TaskParams::new(), CompletionCallback::noop());
        handle.lines()
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ModuleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn register_and_create() {
        let registry = ModuleRegistry::new();
        let old = registry.register("alpha", factory("a"));
        assert!(old.is_none());

        let mut module = registry.create("alpha").expect("alpha is registered");
        assert_eq!(render_label(&mut module), vec!["a"]);
    }

    #[test]
    fn create_returns_fresh_instances() {
        let registry = ModuleRegistry::new();
        registry.register("alpha", factory("a"));
        let first = registry.create("alpha");
        let second = registry.create("alpha");
        assert!(first.is_some());
        assert!(second.is_some());
    }

    #[test]
    fn register_replaces_existing() {
        let registry = ModuleRegistry::new();
        registry.register("alpha", factory("first"));
        let old = registry.register("alpha", factory("second"));
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);

        let mut module = registry.create("alpha").unwrap();
        assert_eq!(render_label(&mut module), vec!["second"]);
    }

    #[test]
    fn create_missing_returns_none() {
        let registry = ModuleRegistry::new();
        registry.register("alpha", factory("a"));
        for id in ["", "beta", "ALPHA", "alpha "] {
            assert!(registry.create(id).is_none(), "{id:?} should not resolve");
            assert!(!registry.contains(id));
        }
    }

    #[test]
    fn ids_are_sorted() {
        let registry = ModuleRegistry::new();
        registry.register("gamma", factory("g"));
        registry.register("alpha", factory("a"));
        registry.register("beta", factory("b"));
        assert_eq!(registry.ids(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn registry_debug_shows_ids() {
        let registry = ModuleRegistry::new();
        registry.register("test-module", factory("t"));
        let debug = format!("{registry:?}");
        assert!(debug.contains("test-module"));
    }
}
