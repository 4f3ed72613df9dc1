//! Core of the perception-training host.
//!
//! - [`module`]: module documents, the [`module::TrainingModule`] capability,
//!   the [`module::ModuleRegistry`] and the loader ports.
//! - [`host`]: the [`host::ModuleHost`] lifecycle controller.
//! - [`adapter`]: the [`adapter::AdapterPollingCoordinator`] talking to the
//!   local sensor adapter service.
//! - [`progress`]: the durable [`progress::ProgressRecord`].
//! - [`training`]: the built-in hearing, vision and vestibular modules.

pub mod adapter;
pub mod error;
pub mod host;
pub mod module;
pub mod progress;
pub mod training;

pub use error::{AdapterError, LoadError, StorageError};
