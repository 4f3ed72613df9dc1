//! Vestibular: follow spoken head-movement instructions, verified against the
//! smart-glasses IMU telemetry from the adapter service.
//!
//! An instruction that is not detected within [`DETECTION_TIMEOUT`] is not
//! recorded as a failure; the next instruction is simply issued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterApi;
use crate::module::types::param_f64;
use crate::module::{CompletionCallback, ContainerWriter, ModuleContainer, TaskParams, TrainingModule};

pub const MODULE_ID: &str = "vestibular-basic";

/// Adapter whose IMU the module reads.
pub const ADAPTER_ID: &str = "smart-glasses-mock";

pub const DETECTION_TIMEOUT: Duration = Duration::from_millis(3000);
pub const NEXT_INSTRUCTION_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Yaw,
    Pitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub label: &'static str,
    /// Audio cue for the presentation layer.
    pub cue: &'static str,
    pub axis: Axis,
    /// +1 or -1.
    pub direction: i8,
}

pub const INSTRUCTIONS: [Instruction; 3] = [
    Instruction {
        label: "head back",
        cue: "vestibular-basic/assets/head-back.mp3",
        axis: Axis::Pitch,
        direction: 1,
    },
    Instruction {
        label: "head forward",
        cue: "vestibular-basic/assets/head-forward.mp3",
        axis: Axis::Pitch,
        direction: -1,
    },
    Instruction {
        label: "look left",
        cue: "vestibular-basic/assets/look-left.mp3",
        axis: Axis::Yaw,
        direction: -1,
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub yaw: f64,
    pub pitch: f64,
}

impl Thresholds {
    pub fn from_params(params: &TaskParams) -> Self {
        Self {
            yaw: param_f64(params, "thresholdYaw", 10.0),
            pitch: param_f64(params, "thresholdPitch", 8.0),
        }
    }
}

/// Whether a read response shows the instructed movement.
pub fn movement_detected(instruction: &Instruction, reading: &Value, thresholds: &Thresholds) -> bool {
    let axis_value = |key: &str| {
        reading
            .get("state")
            .and_then(|s| s.get(key))
            .and_then(|v| match v {
                Value::String(s) => s.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    };
    let (value, threshold) = match instruction.axis {
        Axis::Yaw => (axis_value("imu.yaw"), thresholds.yaw),
        Axis::Pitch => (axis_value("imu.pitch"), thresholds.pitch),
    };
    if instruction.direction < 0 {
        value <= -threshold
    } else {
        value >= threshold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub attempts: u32,
    pub successes: u32,
}

pub struct VestibularModule {
    api: Arc<dyn AdapterApi>,
    score: Arc<Mutex<Score>>,
    cancel: Option<CancellationToken>,
}

impl VestibularModule {
    pub fn new(api: Arc<dyn AdapterApi>) -> Self {
        Self {
            api,
            score: Arc::new(Mutex::new(Score::default())),
            cancel: None,
        }
    }

    pub fn score(&self) -> Score {
        *self.score.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// One start..stop run of instructions.
#[derive(Clone)]
struct Drill {
    api: Arc<dyn AdapterApi>,
    writer: ContainerWriter,
    score: Arc<Mutex<Score>>,
    thresholds: Thresholds,
    poll: Duration,
}

impl Drill {
    fn show_score(&self, status: &str) {
        let score = *self.score.lock().unwrap_or_else(|p| p.into_inner());
        self.writer.set_status(format!(
            "{status} | successes: {} | attempts: {}",
            score.successes, score.attempts
        ));
    }

    async fn run(self, cancel: CancellationToken) {
        self.show_score("running");
        if let Err(e) = self.api.connect(ADAPTER_ID, &json!({})).await {
            tracing::warn!(error = %e, "vestibular drill could not reach adapter");
            self.writer.write_line("adapter unreachable");
            self.show_score("ready");
            return;
        }

        while !cancel.is_cancelled() {
            let instruction = INSTRUCTIONS[rand::rng().random_range(0..INSTRUCTIONS.len())];
            self.score.lock().unwrap_or_else(|p| p.into_inner()).attempts += 1;
            self.writer.write_line(format!("instruction: {}", instruction.label));
            self.show_score("running");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.await_movement(&instruction) => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(NEXT_INSTRUCTION_DELAY) => {}
            }
        }
        self.show_score("ready");
    }

    /// Poll the adapter until the movement shows up or the timeout passes.
    async fn await_movement(&self, instruction: &Instruction) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + self.poll, self.poll);
        let mut elapsed = Duration::ZERO;
        loop {
            ticker.tick().await;
            elapsed += self.poll;
            match self.api.read(ADAPTER_ID).await {
                Ok(reading) if movement_detected(instruction, &reading, &self.thresholds) => {
                    self.score.lock().unwrap_or_else(|p| p.into_inner()).successes += 1;
                    self.writer.write_line("movement detected");
                    self.show_score("running");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "vestibular read failed");
                    self.writer.write_line("reading from adapter failed");
                }
            }
            if elapsed >= DETECTION_TIMEOUT {
                self.writer.write_line("not detected");
                return;
            }
        }
    }
}

impl TrainingModule for VestibularModule {
    fn render(&mut self, mut container: ModuleContainer, params: &TaskParams, _on_complete: CompletionCallback) {
        let drill = Drill {
            api: Arc::clone(&self.api),
            writer: container.writer(),
            score: Arc::clone(&self.score),
            thresholds: Thresholds::from_params(params),
            poll: Duration::from_millis(param_f64(params, "pollMs", 500.0).max(1.0) as u64),
        };
        drill.writer.write_line("actions: start | stop");
        drill.show_score("ready");

        let cancel = CancellationToken::new();
        if let Some(mut actions) = container.take_actions() {
            let module_cancel = cancel.clone();
            tokio::spawn(async move {
                let mut running: Option<CancellationToken> = None;
                loop {
                    let action = tokio::select! {
                        biased;
                        _ = module_cancel.cancelled() => break,
                        action = actions.recv() => match action {
                            Some(action) => action,
                            None => break,
                        },
                    };
                    match action.trim() {
                        "start" => {
                            if running.as_ref().is_some_and(|r| !r.is_cancelled()) {
                                continue;
                            }
                            let run_cancel = module_cancel.child_token();
                            let finished = run_cancel.clone();
                            let drill = drill.clone();
                            tokio::spawn(async move {
                                drill.run(finished.clone()).await;
                                finished.cancel();
                            });
                            running = Some(run_cancel);
                        }
                        "stop" => {
                            if let Some(run) = running.take() {
                                run.cancel();
                            }
                        }
                        _ => {}
                    }
                }
            });
        }
        self.cancel = Some(cancel);
    }

    fn cleanup(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
