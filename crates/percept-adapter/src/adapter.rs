//! The `Adapter` trait -- the device interface behind the adapter service.

use serde_json::Value;

/// A device integration exposed by the adapter service.
///
/// Methods take `&mut self`: the registry serializes access to each adapter,
/// so implementations can keep plain session state.
pub trait Adapter: Send {
    /// Stable identifier used in request paths.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Supported read keys and write commands.
    fn capabilities(&self) -> Value;

    /// Find devices and return their metadata.
    fn discover(&mut self) -> Vec<Value>;

    /// Establish a session using `config`. Returns whether it succeeded.
    fn connect(&mut self, config: &Value) -> bool;

    /// Current device state, or `{"error": ...}`.
    fn read(&mut self) -> Value;

    /// Send a command to the device.
    fn write(&mut self, command: &Value) -> Value;

    /// Close the session. Does nothing by default.
    fn disconnect(&mut self) {}
}

// Compile-time assertion: Adapter must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Adapter) {}
};
