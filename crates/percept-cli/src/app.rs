//! Wiring of the core services from a resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};

use percept_core::adapter::{AdapterApi, AdapterPollingCoordinator, HttpAdapterApi};
use percept_core::host::{HostDeps, ModuleHost};
use percept_core::module::{FsModuleSource, HttpModuleSource, ModuleRegistry, ModuleSource};
use percept_core::progress::{FileStorage, ProgressStore};
use percept_core::training::builtin_plugins;

use crate::config::{ModuleLocation, PerceptConfig};

/// The host plus the adapter coordinator, sharing one adapter client.
pub struct App {
    pub host: ModuleHost,
    pub adapters: AdapterPollingCoordinator,
    pub config: PerceptConfig,
}

impl App {
    /// Build the services. The manifest is not loaded yet; see
    /// [`App::start`].
    pub fn build(config: PerceptConfig) -> Result<Self> {
        let adapter_api: Arc<dyn AdapterApi> = Arc::new(HttpAdapterApi::new(config.adapter_url.clone()));

        let source: Arc<dyn ModuleSource> = match &config.modules {
            ModuleLocation::Dir(dir) => Arc::new(FsModuleSource::new(dir.clone())),
            ModuleLocation::Url(url) => Arc::new(
                HttpModuleSource::new(url).with_context(|| format!("invalid module source URL: {url}"))?,
            ),
        };

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data directory {}", config.data_dir.display()))?;
        let store = ProgressStore::new(Arc::new(FileStorage::new(config.data_dir.clone())));

        let deps = HostDeps::new(
            source,
            Arc::new(builtin_plugins(Arc::clone(&adapter_api))),
            Arc::new(ModuleRegistry::new()),
            store,
        );
        tracing::debug!(modules = %config.modules, adapter_url = %config.adapter_url, "services wired");

        Ok(Self {
            host: ModuleHost::new(deps),
            adapters: AdapterPollingCoordinator::new(adapter_api),
            config,
        })
    }

    /// Build the services and load the manifest.
    pub async fn start(config: PerceptConfig) -> Result<Self> {
        let app = Self::build(config)?;
        app.host.init().await;
        Ok(app)
    }
}
