//! Durable per-module completion counters.

pub mod storage;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub use storage::{FileStorage, MemoryStorage, Storage};

/// Storage key holding the serialized [`ProgressRecord`].
pub const STORAGE_KEY: &str = "percept_progress_v1";

/// Completion counters plus the time of the most recent completion.
///
/// `last_done` is an RFC 3339 UTC timestamp with millisecond precision, or
/// the empty string when nothing was completed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub modules: BTreeMap<String, u64>,
    #[serde(default)]
    pub last_done: String,
}

impl ProgressRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion count for `module_id` (0 if never completed).
    pub fn count(&self, module_id: &str) -> u64 {
        self.modules.get(module_id).copied().unwrap_or(0)
    }

    /// Record one completion of `module_id` at `at`. Returns the new count.
    pub fn record_completion(&mut self, module_id: &str, at: DateTime<Utc>) -> u64 {
        let count = self.modules.entry(module_id.to_string()).or_insert(0);
        *count += 1;
        self.last_done = format_timestamp(at);
        *count
    }

    /// The parsed `last_done` timestamp, if set and well-formed.
    pub fn last_done_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_done)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Loads and persists the [`ProgressRecord`] through a [`Storage`] backend.
#[derive(Clone)]
pub struct ProgressStore {
    storage: Arc<dyn Storage>,
}

impl ProgressStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read the record. Missing, unreadable or corrupt data yields an empty
    /// record.
    pub fn load(&self) -> ProgressRecord {
        let raw = match self.storage.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressRecord::new(),
            Err(e) => {
                tracing::warn!(error = %e, "progress storage unreadable, starting empty");
                return ProgressRecord::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "progress record corrupt, starting empty");
                ProgressRecord::new()
            }
        }
    }

    /// Overwrite the stored record with `record`.
    pub fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record).map_err(|source| StorageError::Serialize {
            key: STORAGE_KEY.to_string(),
            source,
        })?;
        self.storage.set(STORAGE_KEY, &raw)
    }

    /// Replace the stored record with an empty one and return it.
    pub fn reset(&self) -> Result<ProgressRecord, StorageError> {
        let record = ProgressRecord::new();
        self.save(&record)?;
        Ok(record)
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &STORAGE_KEY)
            .finish()
    }
}
