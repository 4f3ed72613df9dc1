//! Per-adapter connection state and recurring telemetry polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::api::{AdapterApi, AdapterDescriptor};
use crate::error::AdapterError;

/// Default spacing between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// What the host knows about one adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdapterState {
    pub connected: bool,
    /// Body of the most recent discover / connect / read response.
    pub last_state: Option<Value>,
    /// Message of the most recent failure, empty when the last operation
    /// succeeded.
    pub error: String,
}

/// One adapter as shown in the status panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterStatus {
    pub descriptor: AdapterDescriptor,
    pub state: AdapterState,
    pub polling: bool,
}

/// A running poll task.
#[derive(Debug)]
struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State shared with the poll tasks.
struct Shared {
    api: Arc<dyn AdapterApi>,
    states: Mutex<HashMap<String, AdapterState>>,
    adapters: Mutex<Vec<AdapterDescriptor>>,
    top_error: Mutex<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn with_state<R>(&self, adapter_id: &str, f: impl FnOnce(&mut AdapterState) -> R) -> R {
        let mut states = lock(&self.states);
        f(states.entry(adapter_id.to_string()).or_default())
    }

    fn snapshot(&self, adapter_id: &str) -> AdapterState {
        self.with_state(adapter_id, |s| s.clone())
    }

    async fn read_once(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        let body = self.api.read(adapter_id).await?;
        self.with_state(adapter_id, |s| {
            if is_truthy(body.get("error")) {
                s.connected = false;
            }
            s.last_state = Some(body.clone());
        });
        Ok(body)
    }
}

/// Coordinates discover / connect / read calls and recurring polls, keyed by
/// adapter id. Each adapter's state and poll task is independent of every
/// other adapter's.
pub struct AdapterPollingCoordinator {
    shared: Arc<Shared>,
    polls: Mutex<HashMap<String, PollHandle>>,
}

impl AdapterPollingCoordinator {
    pub fn new(api: Arc<dyn AdapterApi>) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                states: Mutex::new(HashMap::new()),
                adapters: Mutex::new(Vec::new()),
                top_error: Mutex::new(String::new()),
            }),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh the adapter list.
    ///
    /// On failure the message is kept as the top-level error and an empty
    /// list is returned; the previously known list is left in place.
    pub async fn list_adapters(&self) -> Vec<AdapterDescriptor> {
        lock(&self.shared.top_error).clear();
        match self.shared.api.list_adapters().await {
            Ok(list) => {
                tracing::debug!(count = list.len(), "adapter list refreshed");
                *lock(&self.shared.adapters) = list.clone();
                list
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to list adapters");
                *lock(&self.shared.top_error) = e.to_string();
                Vec::new()
            }
        }
    }

    /// Ask the adapter to look for devices; the response is kept verbatim.
    pub async fn discover(&self, adapter_id: &str) -> AdapterState {
        self.shared.with_state(adapter_id, |s| s.error.clear());
        match self.shared.api.discover(adapter_id).await {
            Ok(body) => self.shared.with_state(adapter_id, |s| s.last_state = Some(body)),
            Err(e) => self.record_error(adapter_id, &e),
        }
        self.shared.snapshot(adapter_id)
    }

    /// Open a session with the adapter's device.
    pub async fn connect(&self, adapter_id: &str) -> AdapterState {
        self.shared.with_state(adapter_id, |s| s.error.clear());
        match self.shared.api.connect(adapter_id, &json!({})).await {
            Ok(body) => self.shared.with_state(adapter_id, |s| {
                s.connected = is_truthy(body.get("connected"));
                s.last_state = Some(body);
            }),
            Err(e) => self.record_error(adapter_id, &e),
        }
        self.shared.snapshot(adapter_id)
    }

    /// Read the adapter's current telemetry once.
    ///
    /// An `error` field in the response clears the connected flag; only
    /// transport and decode failures are returned as errors.
    pub async fn read_once(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        self.shared.read_once(adapter_id).await
    }

    /// Start polling `adapter_id` every `interval`. The first read happens
    /// one interval after the call.
    ///
    /// Returns `false` without doing anything if a poll is already running
    /// for this adapter.
    pub fn start_polling(&self, adapter_id: &str, interval: Duration) -> bool {
        let mut polls = lock(&self.polls);
        if polls.get(adapter_id).is_some_and(|h| !h.task.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            adapter_id.to_string(),
            interval.max(Duration::from_millis(1)),
            cancel.clone(),
        ));
        tracing::info!(adapter_id = %adapter_id, interval_ms = interval.as_millis() as u64, "adapter polling started");
        polls.insert(adapter_id.to_string(), PollHandle { cancel, task });
        true
    }

    /// Stop polling `adapter_id`. Returns `false` if it was not polling.
    pub fn stop_polling(&self, adapter_id: &str) -> bool {
        match lock(&self.polls).remove(adapter_id) {
            Some(handle) => {
                handle.cancel.cancel();
                tracing::info!(adapter_id = %adapter_id, "adapter polling stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, adapter_id: &str) -> bool {
        lock(&self.polls)
            .get(adapter_id)
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Ids of adapters with an active poll, sorted.
    pub fn polling_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.polls)
            .iter()
            .filter(|(_, h)| !h.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// State of `adapter_id`; unknown adapters report the default state.
    pub fn state(&self, adapter_id: &str) -> AdapterState {
        lock(&self.shared.states)
            .get(adapter_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Error from the last failed [`Self::list_adapters`], empty otherwise.
    pub fn top_error(&self) -> String {
        lock(&self.shared.top_error).clone()
    }

    /// Last successfully listed adapters.
    pub fn adapters(&self) -> Vec<AdapterDescriptor> {
        lock(&self.shared.adapters).clone()
    }

    /// Status of every listed adapter, in list order.
    pub fn snapshot(&self) -> Vec<AdapterStatus> {
        self.adapters()
            .into_iter()
            .map(|descriptor| AdapterStatus {
                state: self.state(&descriptor.id),
                polling: self.is_polling(&descriptor.id),
                descriptor,
            })
            .collect()
    }

    /// Cancel every running poll.
    pub fn stop_all(&self) {
        for (_, handle) in lock(&self.polls).drain() {
            handle.cancel.cancel();
        }
    }

    fn record_error(&self, adapter_id: &str, err: &AdapterError) {
        tracing::warn!(adapter_id = %adapter_id, error = %err, "adapter request failed");
        self.shared.with_state(adapter_id, |s| s.error = err.to_string());
    }
}

impl Drop for AdapterPollingCoordinator {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for AdapterPollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterPollingCoordinator")
            .field("polling", &self.polling_ids())
            .finish()
    }
}

async fn poll_loop(shared: Arc<Shared>, adapter_id: String, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        shared.with_state(&adapter_id, |s| s.error.clear());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = shared.read_once(&adapter_id) => {
                if let Err(e) = result {
                    tracing::warn!(adapter_id = %adapter_id, error = %e, "adapter poll failed");
                    shared.with_state(&adapter_id, |s| s.error = e.to_string());
                }
            }
        }
    }
    tracing::debug!(adapter_id = %adapter_id, "poll loop exited");
}

/// JSON truthiness: `null`, `false`, `0`, `""` and absence are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
