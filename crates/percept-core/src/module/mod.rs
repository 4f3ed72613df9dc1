//! Pluggable training modules: documents, capability, registry, loaders.
//!
//! # Architecture
//!
//! ```text
//! ModuleHost
//!     |
//!     |  load_manifest() / load_definition(entry)
//!     v
//! ModuleSource (fs | http) --> Manifest, ModuleDefinition
//!     |
//!     |  load_plugin(entry_script, &registry)
//!     v
//! PluginLoader --register(id, factory)--> ModuleRegistry
//!                                             |
//!                          create(id) --------+--> Box<dyn TrainingModule>
//!                                                    render(container, params, on_complete)
//!                                                    cleanup()
//! ```

pub mod container;
pub mod loader;
pub mod registry;
pub mod trait_def;
pub mod types;

pub use container::{ContainerHandle, ContainerWriter, ModuleContainer, container};
pub use loader::{
    BuiltinPlugins, FsModuleSource, HttpModuleSource, ModuleSource, PluginLoader, PluginRegistrar,
};
pub use registry::{ModuleFactory, ModuleRegistry};
pub use trait_def::{CompletionCallback, TrainingModule};
pub use types::{Manifest, ModuleDefinition, ModuleStub, Step, TaskParams, UiLabels};
