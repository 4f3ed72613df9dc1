//! Built-in training modules and the plugin catalog that registers them.

pub mod hearing;
pub mod vestibular;
pub mod vision;

use std::sync::Arc;

use crate::adapter::AdapterApi;
use crate::module::{BuiltinPlugins, ModuleRegistry, TrainingModule};

pub use hearing::HearingModule;
pub use vestibular::VestibularModule;
pub use vision::VisionModule;

/// Catalog of the built-in modules, keyed by their script directory name.
///
/// The vestibular module reads IMU telemetry through `adapter_api`.
pub fn builtin_plugins(adapter_api: Arc<dyn AdapterApi>) -> BuiltinPlugins {
    BuiltinPlugins::new()
        .with_plugin(
            hearing::MODULE_ID,
            Arc::new(|registry: &ModuleRegistry| {
                registry.register(
                    hearing::MODULE_ID,
                    Arc::new(|| Box::new(HearingModule::new()) as Box<dyn TrainingModule>),
                );
            }),
        )
        .with_plugin(
            vision::MODULE_ID,
            Arc::new(|registry: &ModuleRegistry| {
                registry.register(
                    vision::MODULE_ID,
                    Arc::new(|| Box::new(VisionModule::new()) as Box<dyn TrainingModule>),
                );
            }),
        )
        .with_plugin(
            vestibular::MODULE_ID,
            Arc::new(move |registry: &ModuleRegistry| {
                let api = Arc::clone(&adapter_api);
                registry.register(
                    vestibular::MODULE_ID,
                    Arc::new(move || Box::new(VestibularModule::new(Arc::clone(&api))) as Box<dyn TrainingModule>),
                );
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::HttpAdapterApi;
    use crate::module::PluginLoader;

    #[tokio::test]
    async fn catalog_registers_every_builtin() {
        let plugins = builtin_plugins(Arc::new(HttpAdapterApi::new("http://127.0.0.1:1")));
        assert_eq!(
            plugins.keys(),
            vec!["hearing-basic", "vestibular-basic", "vision-basic"]
        );

        let registry = ModuleRegistry::new();
        for key in plugins.keys() {
            plugins
                .load_plugin(&format!("../backend/{key}/module.js"), &registry)
                .await
                .unwrap();
        }
        assert_eq!(registry.len(), 3);
        assert!(registry.create(vestibular::MODULE_ID).is_some());
    }
}
