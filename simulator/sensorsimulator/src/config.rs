use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Simulator settings, read once at startup and passed into the loop
/// constructor. Components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub client_id: String,
    pub topic_prefix: String,
    /// Pause between publish rounds.
    pub tick_interval: Duration,
    /// Poll cadence while the broker connection is down.
    pub reconnect_poll: Duration,
    /// Total startup budget to reach the connected state.
    pub connect_wait: Duration,
    pub keep_alive: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            client_id: "sensor-simulator".to_string(),
            topic_prefix: "sensors".to_string(),
            tick_interval: Duration::from_secs(1),
            reconnect_poll: Duration::from_secs(2),
            connect_wait: Duration::from_secs(10),
            keep_alive: Duration::from_secs(60),
        }
    }
}

impl SimulatorConfig {
    /// Environment keys: MQTT_HOST, MQTT_PORT, MQTT_TOPIC_PREFIX,
    /// SENSOR_INTERVAL (seconds). Anything unset keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mqtt_host: env_or("MQTT_HOST", defaults.mqtt_host),
            mqtt_port: env_or("MQTT_PORT", defaults.mqtt_port),
            topic_prefix: env_or("MQTT_TOPIC_PREFIX", defaults.topic_prefix),
            tick_interval: Duration::from_secs(env_or("SENSOR_INTERVAL", 1u64)),
            ..defaults
        }
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("ignoring unparsable {key}='{raw}', using default");
                default
            }
        },
        Err(_) => default,
    }
}
