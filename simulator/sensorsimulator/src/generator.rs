use chrono::{DateTime, Utc};
use rand::Rng;
use sensorwire::{Channel, MeasurementPayload, OperationalState, Reading, StatusPayload};

/// Produce one reading for `channel`. Pure given the rng; the caller
/// supplies the timestamp so one round shares a single instant.
pub fn generate(channel: Channel, now: DateTime<Utc>, rng: &mut impl Rng) -> Reading {
    match channel {
        Channel::Temperature => measurement(rng.random_range(15.0..=35.0), 2, "°C", now),
        Channel::Humidity => measurement(rng.random_range(30.0..=85.0), 1, "%", now),
        Channel::Noise => measurement(rng.random_range(20.0..=90.0), 1, "dB", now),
        Channel::Status => Reading::Status(StatusPayload {
            status: draw_state(rng),
            cpu_usage: round_to(rng.random_range(10.0..=95.0), 1),
            memory_usage: round_to(rng.random_range(20.0..=80.0), 1),
            uptime_hours: rng.random_range(1..=8760),
            timestamp: now,
        }),
    }
}

/// One reading per channel, all stamped with the same instant.
pub fn generate_round(now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<(Channel, Reading)> {
    Channel::ALL
        .iter()
        .map(|ch| (*ch, generate(*ch, now, rng)))
        .collect()
}

fn measurement(value: f64, decimals: u32, unit: &str, now: DateTime<Utc>) -> Reading {
    Reading::Measurement(MeasurementPayload {
        value: round_to(value, decimals),
        unit: unit.to_string(),
        timestamp: now,
    })
}

/// Weighted draw: online .70, warning .15, error .10, maintenance .05.
fn draw_state(rng: &mut impl Rng) -> OperationalState {
    let roll: f64 = rng.random_range(0.0..1.0);
    if roll < 0.70 {
        OperationalState::Online
    } else if roll < 0.85 {
        OperationalState::Warning
    } else if roll < 0.95 {
        OperationalState::Error
    } else {
        OperationalState::Maintenance
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
