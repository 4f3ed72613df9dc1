//! Sensor adapter access: the HTTP client port and the polling coordinator.

pub mod api;
pub mod coordinator;

pub use api::{AdapterApi, AdapterDescriptor, DEFAULT_ADAPTER_URL, HttpAdapterApi};
pub use coordinator::{AdapterPollingCoordinator, AdapterState, AdapterStatus, DEFAULT_POLL_INTERVAL};
