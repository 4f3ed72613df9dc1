//! The bundled module documents driven through the host with the built-in
//! modules and a live adapter service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use percept_core::adapter::HttpAdapterApi;
use percept_core::host::{HostDeps, ModuleHost, Panel, View};
use percept_core::module::{ContainerHandle, FsModuleSource, ModuleRegistry};
use percept_core::progress::ProgressStore;
use percept_core::training::builtin_plugins;
use percept_test_utils::{AdapterService, spawn_adapter_service};

fn bundled_modules() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../modules")
}

async fn host() -> (ModuleHost, AdapterService) {
    let service = spawn_adapter_service().await;
    let api = Arc::new(HttpAdapterApi::new(service.base_url()));
    let deps = HostDeps::new(
        Arc::new(FsModuleSource::new(bundled_modules())),
        Arc::new(builtin_plugins(api)),
        Arc::new(ModuleRegistry::new()),
        ProgressStore::in_memory(),
    );
    let host = ModuleHost::new(deps);
    host.init().await;
    (host, service)
}

/// Wait until `pred` holds for the container, up to two seconds.
async fn wait_for(container: &ContainerHandle, pred: impl Fn(&ContainerHandle) -> bool) -> bool {
    for _ in 0..100 {
        if pred(container) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_bundled_manifest_lists_builtins() {
    let (host, _service) = host().await;
    let ids: Vec<String> = host.modules().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["hearing-basic", "vision-basic", "vestibular-basic"]);
}

#[tokio::test]
async fn test_hearing_module_runs_from_bundled_definition() {
    let (host, _service) = host().await;
    host.set_view(View::Module("hearing-basic".into())).await;

    match host.panel() {
        Panel::Module(p) => {
            assert_eq!(p.complete_label, "Session done");
            assert!(p.intro.is_some());
        }
        other => panic!("expected module panel, got {other:?}"),
    }

    let container = host.active_container().unwrap();
    assert_eq!(container.status().as_deref(), Some("tone stopped (440 Hz)"));
    assert!(host.dispatch("play"));
    assert!(wait_for(&container, |c| c.status().as_deref() == Some("tone playing at 440 Hz")).await);

    host.set_view(View::Home).await;
    assert!(!host.dispatch("stop"));
}

#[tokio::test]
async fn test_vestibular_module_reaches_adapter_service() {
    let (host, _service) = host().await;
    host.set_view(View::Module("vestibular-basic".into())).await;
    assert_eq!(host.active_module_id().as_deref(), Some("vestibular-basic"));

    let container = host.active_container().unwrap();
    assert!(host.dispatch("start"));
    let issued = wait_for(&container, |c| c.lines().iter().any(|l| l.starts_with("instruction: "))).await;
    assert!(issued, "lines: {:?}", container.lines());

    assert!(host.dispatch("stop"));
    host.shutdown();
}
