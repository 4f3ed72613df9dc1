//! Shared test utilities for percept integration tests.
//!
//! - [`ScriptedSource`]: a module source with canned manifests and
//!   definitions.
//! - [`Recorder`] / [`RecordingPlugins`]: modules that log their lifecycle
//!   calls so tests can assert ordering; individual plugin loads can be
//!   held back until a test releases them.
//! - [`FakeAdapterApi`]: scripted adapter responses with call counts.
//! - [`spawn_adapter_service`]: the real adapter service on an ephemeral
//!   port.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use percept_adapter::AdapterRegistry;
use percept_core::adapter::{AdapterApi, AdapterDescriptor};
use percept_core::error::{AdapterError, LoadError};
use percept_core::module::loader::plugin_key;
use percept_core::module::{
    CompletionCallback, Manifest, ModuleContainer, ModuleDefinition, ModuleRegistry, ModuleSource, ModuleStub,
    PluginLoader, Step, TaskParams, TrainingModule, UiLabels,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Module source
// ---------------------------------------------------------------------------

/// Entry path used for `id` by [`ScriptedSource::with_module`].
pub fn entry_for(id: &str) -> String {
    format!("{id}/module.json")
}

/// A minimal definition: an intro step and a task step with `params`.
pub fn definition(id: &str, title: &str, params: Value) -> ModuleDefinition {
    ModuleDefinition {
        id: id.to_string(),
        title: title.to_string(),
        entry_script: format!("{id}/module.js"),
        steps: vec![
            Step::Intro {
                text: format!("{title} intro"),
            },
            Step::Task {
                params: params.as_object().cloned().unwrap_or_default(),
            },
        ],
        ui: UiLabels::default(),
    }
}

/// Module source backed by in-memory data.
#[derive(Default)]
pub struct ScriptedSource {
    manifest: Mutex<Option<Manifest>>,
    definitions: Mutex<HashMap<String, Result<ModuleDefinition, LoadError>>>,
    definition_loads: Mutex<HashMap<String, usize>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            manifest: Mutex::new(Some(Manifest::default())),
            ..Self::default()
        }
    }

    /// A source whose manifest cannot be loaded.
    pub fn without_manifest() -> Self {
        Self::default()
    }

    /// Add a manifest entry and its definition.
    pub fn with_module(self, def: ModuleDefinition) -> Self {
        let stub = ModuleStub {
            id: def.id.clone(),
            title: def.title.clone(),
            entry: entry_for(&def.id),
        };
        self.with_stub(stub, Ok(def))
    }

    /// Add a manifest entry whose definition load yields `definition`.
    pub fn with_stub(self, stub: ModuleStub, definition: Result<ModuleDefinition, LoadError>) -> Self {
        lock(&self.definitions).insert(stub.entry.clone(), definition);
        if let Some(manifest) = lock(&self.manifest).as_mut() {
            manifest.modules.push(stub);
        }
        self
    }

    /// How often the definition of `id` was requested.
    pub fn definition_loads(&self, id: &str) -> usize {
        lock(&self.definition_loads)
            .get(&entry_for(id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ModuleSource for ScriptedSource {
    async fn load_manifest(&self) -> Result<Manifest, LoadError> {
        lock(&self.manifest).clone().ok_or_else(|| LoadError::Fetch {
            url: "manifest.json".to_string(),
            reason: "unavailable".to_string(),
        })
    }

    async fn load_definition(&self, entry: &str) -> Result<ModuleDefinition, LoadError> {
        *lock(&self.definition_loads).entry(entry.to_string()).or_default() += 1;
        lock(&self.definitions)
            .get(entry)
            .cloned()
            .unwrap_or_else(|| {
                Err(LoadError::Fetch {
                    url: entry.to_string(),
                    reason: "not found".to_string(),
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Recording modules
// ---------------------------------------------------------------------------

/// Shared log of module lifecycle calls, e.g. `render:a`, `cleanup:a`.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
    callbacks: Mutex<HashMap<String, CompletionCallback>>,
    params: Mutex<HashMap<String, TaskParams>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    /// Number of renders minus number of cleanups.
    pub fn live_instances(&self) -> i64 {
        self.events().iter().fold(0, |live, e| {
            if e.starts_with("render:") {
                live + 1
            } else if e.starts_with("cleanup:") {
                live - 1
            } else {
                live
            }
        })
    }

    /// Invoke the completion callback handed to the latest render of `id`.
    /// Returns `false` if `id` was never rendered.
    pub fn complete(&self, id: &str) -> bool {
        let callback = lock(&self.callbacks).get(id).cloned();
        match callback {
            Some(callback) => {
                callback.complete();
                true
            }
            None => false,
        }
    }

    /// Params passed to the latest render of `id`.
    pub fn params(&self, id: &str) -> Option<TaskParams> {
        lock(&self.params).get(id).cloned()
    }

    fn push(&self, event: String) {
        lock(&self.events).push(event);
    }
}

pub struct RecordingModule {
    id: String,
    recorder: Arc<Recorder>,
    container: Option<ModuleContainer>,
}

impl TrainingModule for RecordingModule {
    fn render(&mut self, container: ModuleContainer, params: &TaskParams, on_complete: CompletionCallback) {
        container.write_line(format!("{} rendered", self.id));
        lock(&self.recorder.callbacks).insert(self.id.clone(), on_complete);
        lock(&self.recorder.params).insert(self.id.clone(), params.clone());
        self.recorder.push(format!("render:{}", self.id));
        self.container = Some(container);
    }

    fn cleanup(&mut self) {
        self.container = None;
        self.recorder.push(format!("cleanup:{}", self.id));
    }
}

/// Plugin loader registering a [`RecordingModule`] under the directory name
/// of each entry script.
pub struct RecordingPlugins {
    recorder: Arc<Recorder>,
    silent: HashSet<String>,
    broken: HashSet<String>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    loads: AtomicUsize,
}

impl RecordingPlugins {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            silent: HashSet::new(),
            broken: HashSet::new(),
            gates: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// The script for `id` loads but registers nothing.
    pub fn silent(mut self, id: &str) -> Self {
        self.silent.insert(id.to_string());
        self
    }

    /// The script for `id` fails to load.
    pub fn broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    /// Hold every later load of `id`'s script until the returned notify is
    /// signalled, once per load.
    pub fn gate(&self, id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.gates).insert(id.to_string(), Arc::clone(&notify));
        notify
    }

    /// Number of `load_plugin` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginLoader for RecordingPlugins {
    async fn load_plugin(&self, entry_script: &str, registry: &ModuleRegistry) -> Result<(), LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let id = plugin_key(entry_script).to_string();
        let gate = lock(&self.gates).get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.broken.contains(&id) {
            return Err(LoadError::ScriptLoad {
                url: entry_script.to_string(),
            });
        }
        if self.silent.contains(&id) {
            return Ok(());
        }
        let recorder = Arc::clone(&self.recorder);
        registry.register(
            id.clone(),
            Arc::new(move || {
                Box::new(RecordingModule {
                    id: id.clone(),
                    recorder: Arc::clone(&recorder),
                    container: None,
                }) as Box<dyn TrainingModule>
            }),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Adapter API
// ---------------------------------------------------------------------------

/// Adapter API with scripted responses.
///
/// Reads pop queued responses per adapter and fall back to
/// `{"state": {}}` once the queue is empty.
#[derive(Default)]
pub struct FakeAdapterApi {
    adapters: Mutex<Vec<AdapterDescriptor>>,
    list_failure: Mutex<Option<String>>,
    connect_bodies: Mutex<HashMap<String, Value>>,
    reads: Mutex<HashMap<String, VecDeque<Result<Value, String>>>>,
    read_counts: Mutex<HashMap<String, usize>>,
}

impl FakeAdapterApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_adapter(&self, id: &str, name: &str) {
        lock(&self.adapters).push(AdapterDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            version: "0.1.0".to_string(),
            capabilities: None,
        });
    }

    /// Make `list_adapters` fail with `reason` (or succeed again with `None`).
    pub fn fail_list(&self, reason: Option<&str>) {
        *lock(&self.list_failure) = reason.map(str::to_string);
    }

    /// Body returned by `connect` for `id`; default `{"connected": true}`.
    pub fn set_connect_body(&self, id: &str, body: Value) {
        lock(&self.connect_bodies).insert(id.to_string(), body);
    }

    pub fn push_read(&self, id: &str, body: Value) {
        lock(&self.reads).entry(id.to_string()).or_default().push_back(Ok(body));
    }

    pub fn push_read_failure(&self, id: &str, reason: &str) {
        lock(&self.reads)
            .entry(id.to_string())
            .or_default()
            .push_back(Err(reason.to_string()));
    }

    pub fn reads(&self, id: &str) -> usize {
        lock(&self.read_counts).get(id).copied().unwrap_or(0)
    }
}

fn transport(id: &str, reason: &str) -> AdapterError {
    AdapterError::Transport {
        url: format!("fake://adapters/{id}"),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl AdapterApi for FakeAdapterApi {
    async fn list_adapters(&self) -> Result<Vec<AdapterDescriptor>, AdapterError> {
        if let Some(reason) = lock(&self.list_failure).clone() {
            return Err(transport("", &reason));
        }
        Ok(lock(&self.adapters).clone())
    }

    async fn discover(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        Ok(json!({ "devices": [{ "id": format!("{adapter_id}-device") }] }))
    }

    async fn connect(&self, adapter_id: &str, _config: &Value) -> Result<Value, AdapterError> {
        Ok(lock(&self.connect_bodies)
            .get(adapter_id)
            .cloned()
            .unwrap_or_else(|| json!({ "connected": true })))
    }

    async fn read(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        *lock(&self.read_counts).entry(adapter_id.to_string()).or_default() += 1;
        let next = lock(&self.reads)
            .get_mut(adapter_id)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(transport(adapter_id, &reason)),
            None => Ok(json!({ "state": {} })),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter service
// ---------------------------------------------------------------------------

/// A running in-process adapter service. Aborted on drop.
pub struct AdapterService {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl AdapterService {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for AdapterService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve the built-in adapters on an ephemeral localhost port.
pub async fn spawn_adapter_service() -> AdapterService {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = percept_adapter::build_router(
        AdapterRegistry::with_builtin_adapters(),
        axum::http::HeaderValue::from_static(percept_adapter::server::DEFAULT_ALLOWED_ORIGIN),
    );
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("adapter service");
    });
    AdapterService { addr, task }
}
