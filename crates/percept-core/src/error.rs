//! Error types shared across the core crate.

use thiserror::Error;

/// Failures while loading the manifest, a module definition or a module's
/// plugin code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The document could not be fetched (transport failure, non-2xx
    /// status, or missing file).
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The document was fetched but is not valid JSON of the expected shape.
    #[error("failed to parse {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The module's entry script could not be loaded.
    #[error("failed to load script {url}")]
    ScriptLoad { url: String },

    /// The entry script loaded but did not register the module id.
    #[error("module {0} is not registered")]
    NotRegistered(String),
}

/// Per-adapter failures talking to the sensor adapter service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("adapter request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("invalid adapter response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failures persisting durable state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {key}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
