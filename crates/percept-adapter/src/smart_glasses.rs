//! Mocked smart glasses with a drifting battery and a noisy IMU.

use std::time::SystemTime;

use rand::Rng;
use serde_json::{Value, json};

use crate::adapter::Adapter;

const BATTERY_DRAIN_PER_READ: f64 = 0.001;

pub struct SmartGlassesAdapter {
    connected: bool,
    device: Value,
    battery: f64,
    last_ping: Option<SystemTime>,
}

impl SmartGlassesAdapter {
    pub const ID: &str = "smart-glasses-mock";

    pub fn new() -> Self {
        Self {
            connected: false,
            device: json!({
                "id": "glasses-001",
                "name": "VisionGlass X",
                "vendor": "Acme",
                "model": "VX-1",
                "protocol": "REST"
            }),
            battery: 0.8,
            last_ping: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_ping(&self) -> Option<SystemTime> {
        self.last_ping
    }
}

impl Default for SmartGlassesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl Adapter for SmartGlassesAdapter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Smart Glasses (Mock)"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn capabilities(&self) -> Value {
        json!({
            "read": ["battery", "status", "imu.yaw", "imu.pitch", "imu.roll"],
            "write": ["vibrate", "display_text", "set_brightness"]
        })
    }

    fn discover(&mut self) -> Vec<Value> {
        vec![self.device.clone()]
    }

    fn connect(&mut self, _config: &Value) -> bool {
        self.connected = true;
        self.last_ping = Some(SystemTime::now());
        true
    }

    fn read(&mut self) -> Value {
        if !self.connected {
            return json!({"error": "not connected"});
        }
        self.battery = (self.battery - BATTERY_DRAIN_PER_READ).max(0.0);
        let mut rng = rand::rng();
        json!({
            "device": self.device,
            "state": {
                "battery": round_to(self.battery, 3),
                "status": "ready",
                "imu.yaw": round_to(rng.random_range(-15.0..15.0), 2),
                "imu.pitch": round_to(rng.random_range(-10.0..10.0), 2),
                "imu.roll": round_to(rng.random_range(-8.0..8.0), 2)
            }
        })
    }

    fn write(&mut self, command: &Value) -> Value {
        if !self.connected {
            return json!({"error": "not connected"});
        }
        json!({"ok": true, "echo": command})
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_requires_connect() {
        let mut glasses = SmartGlassesAdapter::new();
        assert_eq!(glasses.read(), json!({"error": "not connected"}));
        assert_eq!(glasses.write(&json!({"cmd": "vibrate"})), json!({"error": "not connected"}));

        assert!(glasses.connect(&json!({})));
        assert!(glasses.last_ping().is_some());
        let reading = glasses.read();
        assert_eq!(reading["device"]["id"], "glasses-001");
        assert_eq!(reading["state"]["status"], "ready");
    }

    #[test]
    fn imu_stays_in_range_and_battery_drains() {
        let mut glasses = SmartGlassesAdapter::new();
        glasses.connect(&json!({}));
        for _ in 0..200 {
            let state = glasses.read()["state"].clone();
            assert!(state["imu.yaw"].as_f64().unwrap().abs() <= 15.0);
            assert!(state["imu.pitch"].as_f64().unwrap().abs() <= 10.0);
            assert!(state["imu.roll"].as_f64().unwrap().abs() <= 8.0);
        }
        let battery = glasses.read()["state"]["battery"].as_f64().unwrap();
        assert!((battery - 0.599).abs() < 1e-9, "battery = {battery}");
    }

    #[test]
    fn disconnect_ends_session() {
        let mut glasses = SmartGlassesAdapter::new();
        glasses.connect(&json!({}));
        glasses.disconnect();
        assert!(!glasses.is_connected());
        assert!(glasses.read().get("error").is_some());
    }

    #[test]
    fn write_echoes_command() {
        let mut glasses = SmartGlassesAdapter::new();
        glasses.connect(&json!({}));
        let cmd = json!({"cmd": "display_text", "text": "hi"});
        assert_eq!(glasses.write(&cmd), json!({"ok": true, "echo": cmd}));
    }
}
