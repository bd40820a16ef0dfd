pub mod channel;
pub mod parser;
pub mod payload;

pub use channel::{Channel, NOISE_PUBLISH_SUFFIX, NOISE_SUBSCRIBE_SUFFIX};
pub use parser::{parse_inbound, parse_timestamp, InboundRecord, ParseError};
pub use payload::{MeasurementPayload, OperationalState, Reading, StatusPayload};
