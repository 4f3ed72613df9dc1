//! The render surface handed to a module.
//!
//! A [`ModuleContainer`] is the textual stand-in for a DOM node: the module
//! writes status lines into it and receives user actions from it. The host
//! keeps the matching [`ContainerHandle`] to read the output and to forward
//! actions.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Output buffer shared between a container and its handle.
#[derive(Debug, Default)]
struct Output {
    lines: Vec<String>,
    status: Option<String>,
}

/// The module side of a render surface.
#[derive(Debug)]
pub struct ModuleContainer {
    output: Arc<Mutex<Output>>,
    actions: Option<mpsc::UnboundedReceiver<String>>,
}

/// The host side of a render surface.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    output: Arc<Mutex<Output>>,
    actions: mpsc::UnboundedSender<String>,
}

/// Create a connected container / handle pair.
pub fn container() -> (ModuleContainer, ContainerHandle) {
    let output = Arc::new(Mutex::new(Output::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ModuleContainer {
            output: Arc::clone(&output),
            actions: Some(rx),
        },
        ContainerHandle {
            output,
            actions: tx,
        },
    )
}

impl ModuleContainer {
    /// A writer that can be moved into spawned tasks.
    pub fn writer(&self) -> ContainerWriter {
        ContainerWriter {
            output: Arc::clone(&self.output),
        }
    }

    /// Take the receiving end of the action stream. Returns `None` on the
    /// second call.
    pub fn take_actions(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.actions.take()
    }

    pub fn write_line(&self, line: impl Into<String>) {
        self.writer().write_line(line);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.writer().set_status(status);
    }
}

/// Cloneable write access to a container.
#[derive(Debug, Clone)]
pub struct ContainerWriter {
    output: Arc<Mutex<Output>>,
}

impl ContainerWriter {
    pub fn write_line(&self, line: impl Into<String>) {
        if let Ok(mut out) = self.output.lock() {
            out.lines.push(line.into());
        }
    }

    /// Replace the single status line shown above the output.
    pub fn set_status(&self, status: impl Into<String>) {
        if let Ok(mut out) = self.output.lock() {
            out.status = Some(status.into());
        }
    }
}

impl ContainerHandle {
    /// Forward a user action. Returns `false` once the module dropped its
    /// receiver.
    pub fn send_action(&self, action: impl Into<String>) -> bool {
        self.actions.send(action.into()).is_ok()
    }

    pub fn lines(&self) -> Vec<String> {
        self.output
            .lock()
            .map(|out| out.lines.clone())
            .unwrap_or_default()
    }

    pub fn status(&self) -> Option<String> {
        self.output.lock().ok().and_then(|out| out.status.clone())
    }

    /// Remove and return the lines written since the last drain.
    pub fn drain_lines(&self) -> Vec<String> {
        self.output
            .lock()
            .map(|mut out| std::mem::take(&mut out.lines))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_reach_the_handle() {
        let (c, handle) = container();
        c.write_line("one");
        c.writer().write_line("two");
        c.set_status("ready");
        assert_eq!(handle.lines(), vec!["one", "two"]);
        assert_eq!(handle.status().as_deref(), Some("ready"));
        assert_eq!(handle.drain_lines().len(), 2);
        assert!(handle.lines().is_empty());
    }

    #[tokio::test]
    async fn actions_reach_the_module() {
        let (mut c, handle) = container();
        let mut rx = c.take_actions().unwrap();
        assert!(c.take_actions().is_none());
        assert!(handle.send_action("hit"));
        assert_eq!(rx.recv().await.as_deref(), Some("hit"));
        drop(rx);
        assert!(!handle.send_action("hit"));
    }
}
