use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// A received payload normalized for persistence. `raw` keeps the whole
/// original payload so schema additions survive the round trip.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub raw: Value,
}

/// Parse one inbound message body. A malformed body is the caller's cue
/// to drop the message; a malformed `timestamp` alone falls back to
/// `received_at`.
pub fn parse_inbound(payload: &[u8], received_at: DateTime<Utc>) -> Result<InboundRecord, ParseError> {
    let raw: Value = serde_json::from_slice(payload)?;
    let obj = raw.as_object().ok_or(ParseError::NotAnObject)?;

    let timestamp = obj
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)
        .unwrap_or(received_at);

    let value = obj.get("value").and_then(|v| v.as_f64());
    let unit = obj.get("unit").and_then(|v| v.as_str()).map(|s| s.to_string());

    Ok(InboundRecord {
        timestamp,
        value,
        unit,
        raw,
    })
}

/// RFC 3339 first, then bare seconds-since-epoch.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(sec) = t.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(sec, 0);
    }
    None
}
