use serde::{Deserialize, Serialize};

/// Topic suffix the simulator publishes noise readings on.
pub const NOISE_PUBLISH_SUFFIX: &str = "noise";

/// Topic suffix the recorder subscribes to for noise readings.
///
/// Inherited asymmetry: the publisher says `noise`, the subscriber says
/// `noiselevel`, so under default configuration noise readings are never
/// received. Kept as-is until the topic map is owned by one side; see
/// DESIGN.md ("noise vs noiselevel topic mismatch").
pub const NOISE_SUBSCRIBE_SUFFIX: &str = "noiselevel";

/// One of the four fixed sensor channels. No dynamic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Noise,
    Status,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Noise,
        Channel::Status,
    ];

    /// Suffix used when publishing readings for this channel.
    pub fn publish_suffix(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Noise => NOISE_PUBLISH_SUFFIX,
            Channel::Status => "status",
        }
    }

    /// Suffix used when subscribing to readings for this channel.
    pub fn subscribe_suffix(&self) -> &'static str {
        match self {
            Channel::Noise => NOISE_SUBSCRIBE_SUFFIX,
            other => other.publish_suffix(),
        }
    }

    pub fn publish_topic(&self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.publish_suffix())
    }

    pub fn subscribe_topic(&self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.subscribe_suffix())
    }
}

/// The trailing topic segment, used by the recorder to tag documents.
/// Partition identity comes from where the message arrived, never from
/// the payload body.
pub fn sensor_from_topic(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}
