//! The `TrainingModule` trait -- the capability every pluggable module
//! exposes to the host.
//!
//! The trait is object-safe so instances can be held as
//! `Box<dyn TrainingModule>` and produced by the factories stored in the
//! [`super::ModuleRegistry`].

use std::fmt;
use std::sync::Arc;

use super::container::ModuleContainer;
use super::types::TaskParams;

/// Callback a module invokes when its task is satisfied.
#[derive(Clone)]
pub struct CompletionCallback(Arc<dyn Fn() + Send + Sync>);

impl CompletionCallback {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A callback that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn complete(&self) {
        (self.0)()
    }
}

impl fmt::Debug for CompletionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionCallback")
    }
}

/// A self-contained training exercise.
///
/// `render` may spawn tokio tasks (timers, adapter polls); `cleanup` must
/// stop all of them. The host calls `cleanup` exactly once before the next
/// instance renders or when it shuts down.
pub trait TrainingModule: Send {
    /// Draw the module into `container` and start its interaction loop.
    fn render(&mut self, container: ModuleContainer, params: &TaskParams, on_complete: CompletionCallback);

    /// Stop timers, audio and sensor polling started by `render`.
    fn cleanup(&mut self);
}

// Compile-time assertion: TrainingModule must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TrainingModule) {}
};
