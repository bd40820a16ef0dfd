use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sensorsimulator::{MqttChannelPublisher, SimulatorConfig, SimulatorLoop};
use sensorwire::Channel;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = SimulatorConfig::from_env();
    info!("sensor simulator starting");
    info!("broker: {}:{}", cfg.mqtt_host, cfg.mqtt_port);
    info!(
        "topics: {}/[{}]",
        cfg.topic_prefix,
        Channel::ALL
            .iter()
            .map(|c| c.publish_suffix())
            .collect::<Vec<_>>()
            .join("|")
    );
    info!("interval: {:?}", cfg.tick_interval);

    let cancel = CancellationToken::new();
    let publisher = MqttChannelPublisher::connect(&cfg, cancel.clone())
        .await
        .context("MQTT client setup failed")?;

    let mut sim = SimulatorLoop::new(cfg, publisher, cancel.clone());

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("signal received, stopping...");
            Ok(())
        }
        res = sim.start() => res.context("simulator failed"),
    };

    sim.shutdown().await;
    info!("simulator stopped");
    result
}
