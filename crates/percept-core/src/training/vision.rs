//! Vision: hit a moving target while it is highlighted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::module::types::param_f64;
use crate::module::{CompletionCallback, ModuleContainer, TaskParams, TrainingModule};

pub const MODULE_ID: &str = "vision-basic";

const DEFAULT_SPEED_MS: f64 = 800.0;
const MIN_X: i32 = 20;
const MAX_X: i32 = 260;

/// Position and highlight of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub x: i32,
    pub y: i32,
    dir: i32,
    pub hot: bool,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            x: MIN_X,
            y: MIN_X,
            dir: 1,
            hot: false,
        }
    }
}

impl Target {
    /// Advance one tick: move diagonally, bounce at the horizontal bounds,
    /// toggle the highlight.
    pub fn step(&mut self) {
        self.x += 20 * self.dir;
        self.y += 10 * self.dir;
        if self.x > MAX_X || self.x < MIN_X {
            self.dir = -self.dir;
        }
        self.hot = !self.hot;
    }
}

#[derive(Default)]
pub struct VisionModule {
    cancel: Option<CancellationToken>,
}

impl VisionModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrainingModule for VisionModule {
    fn render(&mut self, mut container: ModuleContainer, params: &TaskParams, on_complete: CompletionCallback) {
        let speed = Duration::from_millis(param_f64(params, "speed", DEFAULT_SPEED_MS).max(1.0) as u64);
        let target = Arc::new(Mutex::new(Target::default()));
        let cancel = CancellationToken::new();
        let writer = container.writer();
        writer.set_status("target at (20, 20)");
        writer.write_line("type `hit` while the target is highlighted");

        let ticker_target = Arc::clone(&target);
        let ticker_writer = writer.clone();
        let ticker_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(speed);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = ticker_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let snapshot = {
                    let mut t = ticker_target.lock().unwrap_or_else(|p| p.into_inner());
                    t.step();
                    *t
                };
                ticker_writer.set_status(format!(
                    "target at ({}, {}){}",
                    snapshot.x,
                    snapshot.y,
                    if snapshot.hot { " [highlighted]" } else { "" }
                ));
            }
        });

        if let Some(mut actions) = container.take_actions() {
            let action_cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let action = tokio::select! {
                        biased;
                        _ = action_cancel.cancelled() => break,
                        action = actions.recv() => match action {
                            Some(action) => action,
                            None => break,
                        },
                    };
                    if action.trim() != "hit" {
                        continue;
                    }
                    let hot = target.lock().map(|t| t.hot).unwrap_or(false);
                    if hot {
                        writer.write_line("hit!");
                        on_complete.complete();
                    } else {
                        writer.write_line("missed, wait for the highlight");
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
