use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use percept_core::adapter::AdapterPollingCoordinator;
use percept_test_utils::FakeAdapterApi;

const INTERVAL: Duration = Duration::from_millis(1500);

fn coordinator() -> (AdapterPollingCoordinator, Arc<FakeAdapterApi>) {
    let api = FakeAdapterApi::new();
    api.add_adapter("glasses", "Glasses");
    api.add_adapter("band", "Band");
    (AdapterPollingCoordinator::new(api.clone()), api)
}

#[tokio::test(start_paused = true)]
async fn test_start_polling_is_idempotent() {
    let (coord, api) = coordinator();
    assert!(coord.start_polling("glasses", INTERVAL));
    assert!(!coord.start_polling("glasses", INTERVAL));
    assert_eq!(coord.polling_ids(), vec!["glasses"]);

    // Reads at 1.5s, 3.0s and 4.5s; a second task would double them.
    tokio::time::sleep(Duration::from_millis(4600)).await;
    assert_eq!(api.reads("glasses"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_read_waits_one_interval() {
    let (coord, api) = coordinator();
    coord.start_polling("glasses", INTERVAL);
    tokio::time::sleep(Duration::from_millis(1400)).await;
    assert_eq!(api.reads("glasses"), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(api.reads("glasses"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_polling_halts_reads() {
    let (coord, api) = coordinator();
    coord.start_polling("glasses", INTERVAL);
    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(api.reads("glasses"), 2);

    assert!(coord.stop_polling("glasses"));
    assert!(!coord.stop_polling("glasses"));
    assert!(!coord.is_polling("glasses"));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.reads("glasses"), 2);

    // Polling can be restarted after a stop.
    assert!(coord.start_polling("glasses", INTERVAL));
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_is_isolated_per_adapter() {
    let (coord, api) = coordinator();
    api.push_read_failure("glasses", "connection refused");
    api.push_read("band", json!({"state": {"battery": 0.5}}));

    coord.start_polling("glasses", INTERVAL);
    coord.start_polling("band", INTERVAL);
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let glasses = coord.state("glasses");
    assert!(glasses.error.contains("connection refused"), "{}", glasses.error);
    let band = coord.state("band");
    assert!(band.error.is_empty());
    assert_eq!(band.last_state, Some(json!({"state": {"battery": 0.5}})));

    // The failing adapter keeps polling and recovers on the next good read.
    assert!(coord.is_polling("glasses"));
    tokio::time::sleep(INTERVAL).await;
    assert!(coord.state("glasses").error.is_empty());
    assert_eq!(api.reads("glasses"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polls() {
    let (coord, api) = coordinator();
    coord.start_polling("glasses", INTERVAL);
    coord.start_polling("band", INTERVAL);
    tokio::time::sleep(Duration::from_millis(1600)).await;
    drop(coord);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(api.reads("glasses"), 1);
    assert_eq!(api.reads("band"), 1);
}

#[tokio::test]
async fn test_list_failure_keeps_previous_list() {
    let (coord, api) = coordinator();
    assert_eq!(coord.list_adapters().await.len(), 2);
    assert!(coord.top_error().is_empty());

    api.fail_list(Some("service down"));
    assert!(coord.list_adapters().await.is_empty());
    assert!(coord.top_error().contains("service down"));
    assert_eq!(coord.adapters().len(), 2);

    api.fail_list(None);
    coord.list_adapters().await;
    assert!(coord.top_error().is_empty());
}

#[tokio::test]
async fn test_connect_coerces_truthiness() {
    let (coord, api) = coordinator();
    assert!(coord.connect("glasses").await.connected);

    api.set_connect_body("glasses", json!({"connected": 0}));
    assert!(!coord.connect("glasses").await.connected);

    api.set_connect_body("glasses", json!({"connected": "yes"}));
    assert!(coord.connect("glasses").await.connected);

    api.set_connect_body("band", json!({}));
    let band = coord.connect("band").await;
    assert!(!band.connected);
    assert_eq!(band.last_state, Some(json!({})));
}

#[tokio::test]
async fn test_error_reading_disconnects() {
    let (coord, api) = coordinator();
    coord.connect("glasses").await;
    assert!(coord.connect("band").await.connected);
    api.push_read("glasses", json!({"error": "not connected"}));

    let body = coord.read_once("glasses").await.unwrap();
    assert_eq!(body["error"], "not connected");
    let state = coord.state("glasses");
    assert!(!state.connected);
    assert_eq!(state.last_state, Some(body));
    assert!(coord.state("band").connected);

    api.push_read_failure("glasses", "timeout");
    assert!(coord.read_once("glasses").await.is_err());
}

#[tokio::test]
async fn test_discover_stores_response() {
    let (coord, _api) = coordinator();
    let state = coord.discover("band").await;
    assert_eq!(state.last_state.unwrap()["devices"][0]["id"], "band-device");
    assert!(!state.connected);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_polling() {
    let (coord, _api) = coordinator();
    coord.list_adapters().await;
    coord.start_polling("band", INTERVAL);

    let snapshot = coord.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].descriptor.id, "glasses");
    assert!(!snapshot[0].polling);
    assert!(snapshot[1].polling);
    coord.stop_all();
    assert!(coord.polling_ids().is_empty());
}
