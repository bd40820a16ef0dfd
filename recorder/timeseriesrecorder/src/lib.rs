pub mod config;
pub mod recorder;
pub mod router;

pub use config::RecorderConfig;
pub use recorder::Recorder;
pub use router::{record_message, RecordError, SubscriptionRouter};
