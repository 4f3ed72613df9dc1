//! Hearing: play a tone and sweep its frequency.
//!
//! The module drives a [`ToneSession`]; audio output itself is left to the
//! presentation layer, the session only tracks what should be sounding.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::module::types::param_f64;
use crate::module::{CompletionCallback, ModuleContainer, TaskParams, TrainingModule};

pub const MODULE_ID: &str = "hearing-basic";

/// Tone state: frequency bounds, current frequency, playing or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSession {
    pub min_hz: f64,
    pub max_hz: f64,
    pub frequency_hz: f64,
    pub playing: bool,
}

impl ToneSession {
    pub fn from_params(params: &TaskParams) -> Self {
        let min_hz = param_f64(params, "minHz", 200.0);
        let max_hz = param_f64(params, "maxHz", 1200.0).max(min_hz);
        let start = param_f64(params, "startHz", 440.0).clamp(min_hz, max_hz);
        Self {
            min_hz,
            max_hz,
            frequency_hz: start,
            playing: false,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Set the frequency, clamped to the session bounds. Returns the
    /// frequency actually set.
    pub fn set_frequency(&mut self, hz: f64) -> f64 {
        self.frequency_hz = hz.clamp(self.min_hz, self.max_hz);
        self.frequency_hz
    }

    fn describe(&self) -> String {
        if self.playing {
            format!("tone playing at {} Hz", self.frequency_hz)
        } else {
            format!("tone stopped ({} Hz)", self.frequency_hz)
        }
    }
}

#[derive(Default)]
pub struct HearingModule {
    session: Option<Arc<Mutex<ToneSession>>>,
    cancel: Option<CancellationToken>,
}

impl HearingModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrainingModule for HearingModule {
    fn render(&mut self, mut container: ModuleContainer, params: &TaskParams, _on_complete: CompletionCallback) {
        let session = Arc::new(Mutex::new(ToneSession::from_params(params)));
        let writer = container.writer();
        {
            let s = session.lock().unwrap_or_else(|p| p.into_inner());
            writer.write_line(format!(
                "actions: play | stop | freq <hz> ({}-{} Hz)",
                s.min_hz, s.max_hz
            ));
            writer.set_status(s.describe());
        }

        let cancel = CancellationToken::new();
        if let Some(mut actions) = container.take_actions() {
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let action = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        action = actions.recv() => match action {
                            Some(action) => action,
                            None => break,
                        },
                    };
                    let mut s = session.lock().unwrap_or_else(|p| p.into_inner());
                    let mut words = action.split_whitespace();
                    match (words.next(), words.next()) {
                        (Some("play"), _) => s.play(),
                        (Some("stop"), _) => s.stop(),
                        (Some("freq"), Some(hz)) => match hz.parse::<f64>() {
                            Ok(hz) if hz.is_finite() => {
                                s.set_frequency(hz);
                            }
                            _ => writer.write_line(format!("not a frequency: {hz}")),
                        },
                        _ => continue,
                    }
                    writer.set_status(s.describe());
                }
            });
        }

        self.session = Some(session);
        self.cancel = Some(cancel);
    }

    fn cleanup(&mut self) {
        if let Some(session) = &self.session {
            session.lock().unwrap_or_else(|p| p.into_inner()).stop();
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
