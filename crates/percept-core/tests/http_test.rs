//! The core HTTP client against the real adapter service.

use std::sync::Arc;

use percept_core::adapter::{AdapterApi, AdapterPollingCoordinator, HttpAdapterApi};
use percept_test_utils::spawn_adapter_service;

const GLASSES: &str = "smart-glasses-mock";

#[tokio::test]
async fn test_lists_builtin_adapters() {
    let service = spawn_adapter_service().await;
    let api = HttpAdapterApi::new(format!("{}/", service.base_url()));

    let adapters = api.list_adapters().await.unwrap();
    assert_eq!(adapters.len(), 1);
    assert_eq!(adapters[0].id, GLASSES);
    assert_eq!(adapters[0].name, "Smart Glasses (Mock)");
    assert!(adapters[0].capabilities.is_some());
}

#[tokio::test]
async fn test_connect_then_read() {
    let service = spawn_adapter_service().await;
    let coord = AdapterPollingCoordinator::new(Arc::new(HttpAdapterApi::new(service.base_url())));

    let body = coord.read_once(GLASSES).await.unwrap();
    assert_eq!(body["error"], "not connected");
    assert!(!coord.state(GLASSES).connected);

    let discovered = coord.discover(GLASSES).await;
    assert_eq!(discovered.last_state.unwrap()["devices"][0]["id"], "glasses-001");

    assert!(coord.connect(GLASSES).await.connected);
    let body = coord.read_once(GLASSES).await.unwrap();
    assert_eq!(body["state"]["status"], "ready");
    assert!(coord.state(GLASSES).connected);
}

#[tokio::test]
async fn test_unknown_adapter_body_is_stored() {
    let service = spawn_adapter_service().await;
    let coord = AdapterPollingCoordinator::new(Arc::new(HttpAdapterApi::new(service.base_url())));

    let body = coord.read_once("nope").await.unwrap();
    assert_eq!(body["error"], "adapter not found");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let coord = AdapterPollingCoordinator::new(Arc::new(HttpAdapterApi::new("http://127.0.0.1:9")));
    assert!(coord.list_adapters().await.is_empty());
    assert!(!coord.top_error().is_empty());
    let state = coord.connect(GLASSES).await;
    assert!(!state.error.is_empty());
    assert!(!state.connected);
}
