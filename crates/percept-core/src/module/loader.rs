//! Loader ports: where module documents and module code come from.
//!
//! [`ModuleSource`] fetches the manifest and definition documents;
//! [`PluginLoader`] turns a definition's entry script into a registered
//! factory. Both are pure I/O and hold no lifecycle state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::registry::ModuleRegistry;
use super::types::{Manifest, ModuleDefinition};
use crate::error::LoadError;

/// Source of the manifest and of module definition documents.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetch and parse the manifest.
    async fn load_manifest(&self) -> Result<Manifest, LoadError>;

    /// Fetch and parse one module's definition. `entry` is the manifest
    /// entry, resolved relative to the source.
    async fn load_definition(&self, entry: &str) -> Result<ModuleDefinition, LoadError>;
}

/// Loads a module's code so that it registers itself.
///
/// Loading the same script twice registers it twice; there is no dedupe.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    async fn load_plugin(&self, entry_script: &str, registry: &ModuleRegistry) -> Result<(), LoadError>;
}

// ---------------------------------------------------------------------------
// Filesystem source
// ---------------------------------------------------------------------------

/// Reads documents from a directory holding `manifest.json`.
#[derive(Debug, Clone)]
pub struct FsModuleSource {
    base: PathBuf,
}

impl FsModuleSource {
    pub const MANIFEST_FILE: &str = "manifest.json";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, LoadError> {
        let url = path.display().to_string();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::Fetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        serde_json::from_str(&raw).map_err(|e| LoadError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ModuleSource for FsModuleSource {
    async fn load_manifest(&self) -> Result<Manifest, LoadError> {
        self.read_json(&self.base.join(Self::MANIFEST_FILE)).await
    }

    async fn load_definition(&self, entry: &str) -> Result<ModuleDefinition, LoadError> {
        self.read_json(&self.base.join(entry)).await
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches documents over HTTP relative to a base URL. Responses are never
/// cached.
#[derive(Debug, Clone)]
pub struct HttpModuleSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpModuleSource {
    pub fn new(base: &str) -> Result<Self, LoadError> {
        let mut normalized = base.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|e| LoadError::Fetch {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn resolve(&self, entry: &str) -> Result<Url, LoadError> {
        self.base.join(entry).map_err(|e| LoadError::Fetch {
            url: entry.to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, LoadError> {
        let display = url.to_string();
        let fetch_err = |reason: String| LoadError::Fetch {
            url: display.clone(),
            reason,
        };
        let res = self
            .client
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !res.status().is_success() {
            return Err(fetch_err(format!("status {}", res.status())));
        }
        res.json().await.map_err(|e| LoadError::Decode {
            url: display.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ModuleSource for HttpModuleSource {
    async fn load_manifest(&self) -> Result<Manifest, LoadError> {
        self.fetch_json(self.resolve(FsModuleSource::MANIFEST_FILE)?).await
    }

    async fn load_definition(&self, entry: &str) -> Result<ModuleDefinition, LoadError> {
        self.fetch_json(self.resolve(entry)?).await
    }
}

// ---------------------------------------------------------------------------
// Built-in plugins
// ---------------------------------------------------------------------------

/// Registers one plugin's factories into a registry.
pub type PluginRegistrar = Arc<dyn Fn(&ModuleRegistry) + Send + Sync>;

/// Plugins compiled into the binary, keyed by [`plugin_key`].
#[derive(Default, Clone)]
pub struct BuiltinPlugins {
    plugins: HashMap<String, PluginRegistrar>,
}

impl BuiltinPlugins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin under `key`, replacing any previous one.
    pub fn with_plugin(mut self, key: impl Into<String>, registrar: PluginRegistrar) -> Self {
        self.plugins.insert(key.into(), registrar);
        self
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for BuiltinPlugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinPlugins")
            .field("plugins", &self.keys())
            .finish()
    }
}

#[async_trait]
impl PluginLoader for BuiltinPlugins {
    async fn load_plugin(&self, entry_script: &str, registry: &ModuleRegistry) -> Result<(), LoadError> {
        let key = plugin_key(entry_script);
        let registrar = self
            .plugins
            .get(key)
            .ok_or_else(|| LoadError::ScriptLoad {
                url: entry_script.to_string(),
            })?;
        tracing::debug!(script = %entry_script, plugin = %key, "loading built-in plugin");
        registrar(registry);
        Ok(())
    }
}

/// Key a script location maps to: the name of the directory holding the
/// script, or the file stem when the script has no directory.
///
/// `../backend/vision-basic/module.js` -> `vision-basic`,
/// `vision-basic.js` -> `vision-basic`.
pub fn plugin_key(entry_script: &str) -> &str {
    let path = entry_script
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let mut segments = path.rsplit('/');
    let file = segments.next().unwrap_or_default();
    match segments.find(|s| !s.is_empty() && *s != "." && *s != "..") {
        Some(dir) if file.contains('.') => dir,
        _ => file.split('.').next().unwrap_or(file),
    }
}
