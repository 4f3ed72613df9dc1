//! Module host: drives the view / module lifecycle.
//!
//! The host loads the manifest, renders the requested view, and owns the
//! single active [`TrainingModule`] instance. Switching to a module view
//! takes a new render token before the asynchronous definition / plugin
//! load starts; the loaded module is committed only if no later switch
//! took a newer token in the meantime. Stale loads are dropped silently.
//! Switching to any other view also invalidates the in-flight load and
//! cleans up the active module.

pub mod panel;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::{LoadError, StorageError};
use crate::module::{
    CompletionCallback, ContainerHandle, Manifest, ModuleDefinition, ModuleRegistry, ModuleSource, ModuleStub,
    PluginLoader, TrainingModule, container,
};
use crate::progress::{ProgressRecord, ProgressStore};

pub use panel::{HostPhase, ModuleEntry, ModulePanel, Panel, ProgressPanel, ProgressRow, View};

/// Source of "now" for completion timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Everything the host depends on.
#[derive(Clone)]
pub struct HostDeps {
    pub source: Arc<dyn ModuleSource>,
    pub plugins: Arc<dyn PluginLoader>,
    pub registry: Arc<ModuleRegistry>,
    pub store: ProgressStore,
    pub clock: Clock,
}

impl HostDeps {
    pub fn new(
        source: Arc<dyn ModuleSource>,
        plugins: Arc<dyn PluginLoader>,
        registry: Arc<ModuleRegistry>,
        store: ProgressStore,
    ) -> Self {
        Self {
            source,
            plugins,
            registry,
            store,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

struct HostState {
    view: View,
    phase: HostPhase,
    panel: Panel,
    stubs: HashMap<String, ModuleStub>,
    module_list: Vec<ModuleEntry>,
    definitions: HashMap<String, ModuleDefinition>,
    progress: ProgressRecord,
}

struct ActiveModule {
    module_id: String,
    instance: Box<dyn TrainingModule>,
    container: ContainerHandle,
}

struct Inner {
    deps: HostDeps,
    state: Mutex<HostState>,
    active: Mutex<Option<ActiveModule>>,
    render_token: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The app controller. Cheap to clone; clones share one host.
#[derive(Clone)]
pub struct ModuleHost {
    inner: Arc<Inner>,
}

impl ModuleHost {
    /// Create a host showing the home view. Progress is restored from the
    /// store immediately; the manifest is loaded by [`Self::init`].
    pub fn new(deps: HostDeps) -> Self {
        let progress = deps.store.load();
        Self {
            inner: Arc::new(Inner {
                deps,
                state: Mutex::new(HostState {
                    view: View::Home,
                    phase: HostPhase::Idle,
                    panel: Panel::Blank,
                    stubs: HashMap::new(),
                    module_list: Vec::new(),
                    definitions: HashMap::new(),
                    progress,
                }),
                active: Mutex::new(None),
                render_token: AtomicU64::new(0),
            }),
        }
    }

    /// Load the manifest and every module definition, then render the
    /// current view.
    ///
    /// A manifest that cannot be loaded leaves the host with no modules. A
    /// definition that cannot be loaded keeps the manifest entry, titled
    /// from the manifest.
    pub async fn init(&self) {
        lock(&self.inner.state).phase = HostPhase::ManifestLoading;

        let source = &self.inner.deps.source;
        let manifest = match source.load_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(error = %e, "manifest unavailable, continuing without modules");
                Manifest::default()
            }
        };

        let loaded = join_all(manifest.modules.iter().map(|stub| async move {
            let result = source.load_definition(&stub.entry).await;
            (stub, result)
        }))
        .await;

        {
            let mut state = lock(&self.inner.state);
            state.stubs.clear();
            state.module_list.clear();
            for (stub, result) in loaded {
                let title = match result {
                    Ok(def) => {
                        let title = first_non_empty([&def.title, &stub.title, &stub.id]);
                        state.definitions.insert(stub.id.clone(), def);
                        title
                    }
                    Err(e) => {
                        tracing::warn!(module_id = %stub.id, error = %e, "module definition unavailable");
                        first_non_empty([&stub.title, &stub.id])
                    }
                };
                state.module_list.push(ModuleEntry {
                    id: stub.id.clone(),
                    title,
                });
                state.stubs.insert(stub.id.clone(), stub.clone());
            }
            state.phase = HostPhase::Ready;
            tracing::info!(modules = state.module_list.len(), "manifest loaded");
        }

        self.render().await;
    }

    /// Switch to `view` and render it.
    pub async fn set_view(&self, view: View) {
        lock(&self.inner.state).view = view;
        self.render().await;
    }

    /// Render the current view. Module views load asynchronously; the other
    /// views render immediately.
    pub async fn render(&self) {
        let view = lock(&self.inner.state).view.clone();
        match view {
            View::Module(id) => self.show_module(&id).await,
            View::Home | View::Progress => {
                self.inner.deactivate();
                self.inner.refresh_panel();
            }
        }
    }

    async fn show_module(&self, module_id: &str) {
        let stub = {
            let mut state = lock(&self.inner.state);
            let found = state.stubs.get(module_id).cloned();
            match found {
                Some(stub) => {
                    state.panel = Panel::Loading {
                        module_id: module_id.to_string(),
                        title: stub.title.clone(),
                    };
                    state.phase = HostPhase::ModuleLoading(module_id.to_string());
                    stub
                }
                None => {
                    state.panel = Panel::Unavailable {
                        module_id: module_id.to_string(),
                    };
                    drop(state);
                    self.inner.deactivate();
                    return;
                }
            }
        };

        let token = self.inner.render_token.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(module_id = %module_id, token, "loading module");

        let result = self.load_module(&stub).await;

        if !self.inner.is_current(token) {
            tracing::debug!(module_id = %module_id, token, "discarding stale module load");
            return;
        }

        match result {
            Ok(def) => self.inner.commit(token, module_id, &def),
            Err(e) => self.inner.fail(token, &e),
        }
    }

    async fn load_module(&self, stub: &ModuleStub) -> Result<ModuleDefinition, LoadError> {
        let cached = lock(&self.inner.state).definitions.get(&stub.id).cloned();
        let def = match cached {
            Some(def) => def,
            None => {
                let def = self.inner.deps.source.load_definition(&stub.entry).await?;
                lock(&self.inner.state)
                    .definitions
                    .insert(stub.id.clone(), def.clone());
                def
            }
        };
        self.inner
            .deps
            .plugins
            .load_plugin(&def.entry_script, &self.inner.deps.registry)
            .await?;
        Ok(def)
    }

    /// Record one completion of `module_id`, persist, and re-render the
    /// current panel. Returns the new count.
    pub fn mark_done(&self, module_id: &str) -> Result<u64, StorageError> {
        self.inner.mark_done(module_id)
    }

    /// Clear all progress, persist, and re-render the current panel.
    pub fn reset_progress(&self) -> Result<(), StorageError> {
        let record = self.inner.deps.store.reset()?;
        lock(&self.inner.state).progress = record;
        tracing::info!("progress reset");
        self.inner.refresh_panel();
        Ok(())
    }

    /// Forward a user action to the active module. Returns `false` when no
    /// module is active or it stopped listening.
    pub fn dispatch(&self, action: &str) -> bool {
        lock(&self.inner.active)
            .as_ref()
            .is_some_and(|active| active.container.send_action(action))
    }

    /// Tear down the active module, if any.
    pub fn shutdown(&self) {
        self.inner.deactivate();
    }

    pub fn view(&self) -> View {
        lock(&self.inner.state).view.clone()
    }

    pub fn phase(&self) -> HostPhase {
        lock(&self.inner.state).phase.clone()
    }

    pub fn panel(&self) -> Panel {
        lock(&self.inner.state).panel.clone()
    }

    pub fn progress(&self) -> ProgressRecord {
        lock(&self.inner.state).progress.clone()
    }

    /// Modules from the manifest, in manifest order.
    pub fn modules(&self) -> Vec<ModuleEntry> {
        lock(&self.inner.state).module_list.clone()
    }

    pub fn active_module_id(&self) -> Option<String> {
        lock(&self.inner.active).as_ref().map(|a| a.module_id.clone())
    }

    /// Output surface of the active module.
    pub fn active_container(&self) -> Option<ContainerHandle> {
        lock(&self.inner.active).as_ref().map(|a| a.container.clone())
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.inner.deps.registry
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("view", &self.view())
            .field("phase", &self.phase())
            .field("active", &self.active_module_id())
            .finish()
    }
}

impl Inner {
    fn is_current(&self, token: u64) -> bool {
        self.render_token.load(Ordering::SeqCst) == token
    }

    /// Activate the loaded module. Holding the `active` lock across the
    /// token check and the swap keeps commits totally ordered.
    fn commit(self: &Arc<Self>, token: u64, module_id: &str, def: &ModuleDefinition) {
        let mut active = lock(&self.active);
        if !self.is_current(token) {
            tracing::debug!(module_id = %module_id, token, "discarding stale module load");
            return;
        }

        if let Some(mut previous) = active.take() {
            tracing::debug!(module_id = %previous.module_id, "cleaning up previous module");
            previous.instance.cleanup();
        }

        let Some(mut instance) = self.deps.registry.create(&def.id) else {
            drop(active);
            self.fail(token, &LoadError::NotRegistered(def.id.clone()));
            return;
        };

        let (module_container, handle) = container();
        {
            let mut state = lock(&self.state);
            state.panel = Panel::Module(ModulePanel {
                module_id: module_id.to_string(),
                title: first_non_empty([&def.title, &module_id.to_string()]),
                intro: def.intro_text().map(str::to_string),
                complete_label: def.complete_label().to_string(),
                completions: state.progress.count(module_id),
            });
            state.phase = HostPhase::ModuleActive(module_id.to_string());
        }

        instance.render(module_container, &def.task_params(), self.completion_callback(module_id));
        tracing::info!(module_id = %module_id, token, "module active");
        *active = Some(ActiveModule {
            module_id: module_id.to_string(),
            instance,
            container: handle,
        });
    }

    /// Invalidate in-flight module loads and clean up the active module.
    fn deactivate(&self) {
        self.render_token.fetch_add(1, Ordering::SeqCst);
        if let Some(mut active) = lock(&self.active).take() {
            tracing::debug!(module_id = %active.module_id, "cleaning up module");
            active.instance.cleanup();
        }
        let mut state = lock(&self.state);
        if matches!(state.phase, HostPhase::ModuleActive(_) | HostPhase::ModuleLoading(_)) {
            state.phase = HostPhase::Ready;
        }
    }

    fn fail(&self, token: u64, err: &LoadError) {
        let mut state = lock(&self.state);
        if !self.is_current(token) {
            return;
        }
        tracing::warn!(error = %err, token, "module load failed");
        state.panel = Panel::Error {
            message: err.to_string(),
        };
        state.phase = HostPhase::Ready;
    }

    fn completion_callback(self: &Arc<Self>, module_id: &str) -> CompletionCallback {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let module_id = module_id.to_string();
        CompletionCallback::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = inner.mark_done(&module_id) {
                    tracing::error!(module_id = %module_id, error = %e, "failed to persist progress");
                }
            }
        })
    }

    fn mark_done(&self, module_id: &str) -> Result<u64, StorageError> {
        let now = (self.deps.clock)();
        let count = {
            let mut state = lock(&self.state);
            let mut updated = state.progress.clone();
            let count = updated.record_completion(module_id, now);
            self.deps.store.save(&updated)?;
            state.progress = updated;
            count
        };
        tracing::info!(module_id = %module_id, count, "module marked done");
        self.refresh_panel();
        Ok(count)
    }

    /// Re-render the current panel from in-memory state. Module views only
    /// refresh their completion count; the active instance is kept.
    fn refresh_panel(&self) {
        let mut state = lock(&self.state);
        let panel = match &state.view {
            View::Home => Panel::Home {
                modules: state.module_list.clone(),
            },
            View::Progress => Panel::Progress(ProgressPanel {
                rows: state
                    .module_list
                    .iter()
                    .map(|m| ProgressRow {
                        module_id: m.id.clone(),
                        title: m.title.clone(),
                        count: state.progress.count(&m.id),
                    })
                    .collect(),
                last_done: state.progress.last_done.clone(),
            }),
            View::Module(id) => match &state.panel {
                Panel::Module(p) if &p.module_id == id => Panel::Module(ModulePanel {
                    completions: state.progress.count(id),
                    ..p.clone()
                }),
                other => other.clone(),
            },
        };
        state.panel = panel;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mut active) = active.take() {
            active.instance.cleanup();
        }
    }
}

fn first_non_empty<const N: usize>(candidates: [&String; N]) -> String {
    candidates
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default()
}
