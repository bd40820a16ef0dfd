use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SimulatorConfig;
use crate::generator;
use crate::publisher::ChannelPublisher;

#[derive(thiserror::Error, Debug)]
pub enum SimulatorError {
    #[error("broker not connected within {0:?}")]
    ConnectionTimeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Stopped,
    Connecting,
    WaitingForConnection,
    Running,
}

/// Owns the tick cadence and lifecycle. Per-tick publish errors are
/// logged and swallowed; only the startup connection wait is fatal.
pub struct SimulatorLoop<P: ChannelPublisher> {
    cfg: SimulatorConfig,
    publisher: P,
    cancel: CancellationToken,
    state: SimulatorState,
    stopped: AtomicBool,
}

impl<P: ChannelPublisher> SimulatorLoop<P> {
    pub fn new(cfg: SimulatorConfig, publisher: P, cancel: CancellationToken) -> Self {
        Self {
            cfg,
            publisher,
            cancel,
            state: SimulatorState::Stopped,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect (bounded wait), then run until shutdown.
    pub async fn start(&mut self) -> Result<(), SimulatorError> {
        self.connect_phase().await?;
        self.run_inner(None).await
    }

    /// Bounded variant: stop after `ticks` publish rounds.
    pub async fn run_ticks(&mut self, ticks: u64) -> Result<(), SimulatorError> {
        self.connect_phase().await?;
        self.run_inner(Some(ticks)).await
    }

    /// Idempotent: the second call finds the flag set and does nothing.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = self.publisher.disconnect().await {
            warn!("disconnect failed: {e:#}");
        }
    }

    async fn connect_phase(&mut self) -> Result<(), SimulatorError> {
        self.state = SimulatorState::Connecting;
        self.state = SimulatorState::WaitingForConnection;

        match self.publisher.wait_connected(self.cfg.connect_wait).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SimulatorState::Stopped;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self, max_ticks: Option<u64>) -> Result<(), SimulatorError> {
        self.state = SimulatorState::Running;
        info!("simulation loop started");

        let mut ticks = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(limit) = max_ticks {
                if ticks >= limit {
                    break;
                }
            }

            if self.publisher.status().can_publish() {
                self.publish_round().await;
                ticks += 1;

                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.cfg.tick_interval) => {}
                }
            } else {
                // No busy-spin while the connection is down.
                warn!("waiting for MQTT connection...");
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.cfg.reconnect_poll) => {}
                }
            }
        }

        self.state = SimulatorState::Stopped;
        info!("simulation loop stopped");
        Ok(())
    }

    async fn publish_round(&self) {
        let round = {
            let mut rng = rand::rng();
            generator::generate_round(Utc::now(), &mut rng)
        };

        let mut summary = Vec::with_capacity(round.len());
        for (channel, reading) in round {
            match self.publisher.publish(channel, &reading).await {
                Ok(()) => summary.push(describe(channel.publish_suffix(), &reading)),
                Err(e) => {
                    // This reading is lost; the loop keeps running.
                    warn!("publish failed on '{}': {e:#}", channel.publish_suffix());
                }
            }
        }
        info!("published: {}", summary.join(" | "));
    }
}

fn describe(name: &str, reading: &sensorwire::Reading) -> String {
    match reading {
        sensorwire::Reading::Measurement(m) => format!("{name}={}{}", m.value, m.unit),
        sensorwire::Reading::Status(s) => format!("{name}={}", s.status.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::ConnectionStatus;
    use anyhow::Result;
    use async_trait::async_trait;
    use sensorwire::{Channel, Reading};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct MockPublisher {
        status: ConnectionStatus,
        connects: bool,
        published: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
    }

    impl MockPublisher {
        fn new(status: ConnectionStatus, connects: bool) -> Self {
            Self {
                status,
                connects,
                published: Arc::new(AtomicUsize::new(0)),
                disconnects: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ChannelPublisher for MockPublisher {
        fn status(&self) -> ConnectionStatus {
            self.status
        }

        async fn wait_connected(&self, budget: Duration) -> Result<(), SimulatorError> {
            if self.connects {
                Ok(())
            } else {
                Err(SimulatorError::ConnectionTimeout(budget))
            }
        }

        async fn publish(&self, _channel: Channel, _reading: &Reading) -> Result<()> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> SimulatorConfig {
        SimulatorConfig {
            tick_interval: Duration::ZERO,
            reconnect_poll: Duration::from_millis(5),
            connect_wait: Duration::from_millis(10),
            ..SimulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bounded_run_publishes_four_per_tick() {
        let publisher = MockPublisher::new(ConnectionStatus::Connected, true);
        let published = publisher.published.clone();
        let mut sim = SimulatorLoop::new(fast_config(), publisher, CancellationToken::new());

        sim.run_ticks(3).await.unwrap();
        assert_eq!(published.load(Ordering::SeqCst), 12);
        assert_eq!(sim.state(), SimulatorState::Stopped);
    }

    #[tokio::test]
    async fn test_no_publish_while_disconnected() {
        // Connection accepted at startup, then reported down for the
        // whole run: the loop must poll, never publish.
        let publisher = MockPublisher::new(ConnectionStatus::Disconnected, true);
        let published = publisher.published.clone();
        let cancel = CancellationToken::new();
        let mut sim = SimulatorLoop::new(fast_config(), publisher, cancel.clone());

        let handle = tokio::spawn(async move {
            sim.start().await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_startup_timeout_is_fatal() {
        let publisher = MockPublisher::new(ConnectionStatus::Disconnected, false);
        let mut sim = SimulatorLoop::new(fast_config(), publisher, CancellationToken::new());

        let err = sim.start().await.unwrap_err();
        assert!(matches!(err, SimulatorError::ConnectionTimeout(_)));
        assert_eq!(sim.state(), SimulatorState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let publisher = MockPublisher::new(ConnectionStatus::Connected, true);
        let disconnects = publisher.disconnects.clone();
        let sim = SimulatorLoop::new(fast_config(), publisher, CancellationToken::new());

        sim.shutdown().await;
        sim.shutdown().await;
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep_promptly() {
        let publisher = MockPublisher::new(ConnectionStatus::Connected, true);
        let cancel = CancellationToken::new();
        let cfg = SimulatorConfig {
            tick_interval: Duration::from_secs(3600),
            ..fast_config()
        };
        let mut sim = SimulatorLoop::new(cfg, publisher, cancel.clone());

        let handle = tokio::spawn(async move { sim.start().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        // Must return well before the hour-long tick elapses.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not observe shutdown")
            .unwrap()
            .unwrap();
    }
}
