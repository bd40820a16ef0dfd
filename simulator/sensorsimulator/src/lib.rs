pub mod config;
pub mod generator;
pub mod publisher;
pub mod simulator;

pub use config::SimulatorConfig;
pub use publisher::{ChannelPublisher, ConnectionEvent, ConnectionStatus, MqttChannelPublisher};
pub use simulator::{SimulatorError, SimulatorLoop, SimulatorState};
