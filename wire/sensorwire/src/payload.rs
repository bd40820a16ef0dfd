use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ---- Wire schema (readings on MQTT) ----

/// Payload for the numeric channels (temperature, humidity, noise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload for the operational-status channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: OperationalState,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub uptime_hours: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalState {
    Online,
    Warning,
    Error,
    Maintenance,
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalState::Online => "online",
            OperationalState::Warning => "warning",
            OperationalState::Error => "error",
            OperationalState::Maintenance => "maintenance",
        }
    }
}

/// One generated measurement, created by the simulator and discarded
/// right after publishing. The channel is carried by the topic, not the
/// payload body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Measurement(MeasurementPayload),
    Status(StatusPayload),
}

impl Reading {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Reading::Measurement(m) => m.timestamp,
            Reading::Status(s) => s.timestamp,
        }
    }

    /// Numeric value, if this reading has one.
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Measurement(m) => Some(m.value),
            Reading::Status(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
