//! Local sensor adapter service.
//!
//! Exposes pluggable device [`Adapter`]s over a small JSON HTTP API that the
//! host polls for telemetry:
//!
//! ```text
//! GET  /adapters                 -> [{id, name, version, capabilities}]
//! GET  /adapters/{id}            -> {id, name, version, capabilities}
//! GET  /adapters/{id}/read       -> {device, state} | {error}
//! POST /adapters/{id}/discover   -> {devices: [...]}
//! POST /adapters/{id}/connect    -> {connected}
//! POST /adapters/{id}/write      -> adapter-defined result
//! ```

pub mod adapter;
pub mod registry;
pub mod server;
pub mod smart_glasses;

pub use adapter::Adapter;
pub use registry::AdapterRegistry;
pub use server::{AppError, ServerConfig, build_router, run_server};
pub use smart_glasses::SmartGlassesAdapter;
