use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sensorwire::{Channel, Reading};

use crate::config::SimulatorConfig;
use crate::simulator::SimulatorError;

/// Broker connection state as observed from the client's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Bus-level happenings that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectStarted,
    ConnAckReceived,
    DisconnectReceived,
    ConnectErrored,
}

impl ConnectionStatus {
    pub fn apply(self, event: ConnectionEvent) -> ConnectionStatus {
        match event {
            ConnectionEvent::ConnectStarted => ConnectionStatus::Connecting,
            ConnectionEvent::ConnAckReceived => ConnectionStatus::Connected,
            ConnectionEvent::DisconnectReceived => ConnectionStatus::Disconnected,
            ConnectionEvent::ConnectErrored => match self {
                ConnectionStatus::Connecting => ConnectionStatus::Failed,
                _ => ConnectionStatus::Disconnected,
            },
        }
    }

    pub fn can_publish(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

/// Publishing side of the bus. The simulator loop talks to this trait so
/// tests can swap in a counting fake.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    fn status(&self) -> ConnectionStatus;

    /// Block until the connection is up, or fail with a startup timeout.
    async fn wait_connected(&self, budget: Duration) -> Result<(), SimulatorError>;

    async fn publish(&self, channel: Channel, reading: &Reading) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Publisher over rumqttc. A spawned driver polls the event loop and
/// reports status changes through a watch channel; the client handles
/// reconnection on its own, this side only reacts to state changes.
pub struct MqttChannelPublisher {
    client: AsyncClient,
    status_rx: watch::Receiver<ConnectionStatus>,
    topic_prefix: String,
    driver: JoinHandle<()>,
}

impl MqttChannelPublisher {
    pub async fn connect(cfg: &SimulatorConfig, cancel: CancellationToken) -> Result<Self> {
        let mut opts = MqttOptions::new(&cfg.client_id, &cfg.mqtt_host, cfg.mqtt_port);
        opts.set_keep_alive(cfg.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(opts, 50);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let driver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("MQTT driver cancelled");
                        break;
                    }
                    ev = eventloop.poll() => {
                        match ev {
                            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                                status_tx.send_modify(|s| *s = s.apply(ConnectionEvent::ConnAckReceived));
                                info!("connected to MQTT broker");
                            }
                            Ok(Event::Incoming(Incoming::Disconnect)) => {
                                status_tx.send_modify(|s| *s = s.apply(ConnectionEvent::DisconnectReceived));
                                warn!("disconnected from MQTT broker");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                status_tx.send_modify(|s| *s = s.apply(ConnectionEvent::ConnectErrored));
                                warn!("MQTT poll error: {e} (retrying)");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            client,
            status_rx,
            topic_prefix: cfg.topic_prefix.clone(),
            driver,
        })
    }

    pub fn driver_handle(&self) -> &JoinHandle<()> {
        &self.driver
    }
}

#[async_trait]
impl ChannelPublisher for MqttChannelPublisher {
    fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    async fn wait_connected(&self, budget: Duration) -> Result<(), SimulatorError> {
        let mut rx = self.status_rx.clone();
        let wait = rx.wait_for(|s| s.can_publish());
        let result = match tokio::time::timeout(budget, wait).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(SimulatorError::ConnectionTimeout(budget)),
        };
        result
    }

    async fn publish(&self, channel: Channel, reading: &Reading) -> Result<()> {
        anyhow::ensure!(self.status().can_publish(), "not connected to broker");

        let topic = channel.publish_topic(&self.topic_prefix);
        let payload = reading.to_bytes().context("encode reading")?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("publish failed")?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await.context("disconnect failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_happy_path() {
        let s = ConnectionStatus::Disconnected;
        let s = s.apply(ConnectionEvent::ConnectStarted);
        assert_eq!(s, ConnectionStatus::Connecting);
        let s = s.apply(ConnectionEvent::ConnAckReceived);
        assert_eq!(s, ConnectionStatus::Connected);
        let s = s.apply(ConnectionEvent::DisconnectReceived);
        assert_eq!(s, ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_connect_error_while_connecting_is_fatal_state() {
        let s = ConnectionStatus::Connecting.apply(ConnectionEvent::ConnectErrored);
        assert_eq!(s, ConnectionStatus::Failed);
    }

    #[test]
    fn test_error_after_connected_is_a_disconnect() {
        let s = ConnectionStatus::Connected.apply(ConnectionEvent::ConnectErrored);
        assert_eq!(s, ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_only_connected_can_publish() {
        assert!(ConnectionStatus::Connected.can_publish());
        assert!(!ConnectionStatus::Disconnected.can_publish());
        assert!(!ConnectionStatus::Connecting.can_publish());
        assert!(!ConnectionStatus::Failed.can_publish());
    }
}
