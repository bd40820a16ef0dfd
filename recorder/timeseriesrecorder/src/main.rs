use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use timeseriesrecorder::{Recorder, RecorderConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = RecorderConfig::from_env();
    info!("time series recorder starting");
    info!("broker: {}:{}", cfg.mqtt_host, cfg.mqtt_port);
    info!("store: {}:{}/{}", cfg.pg_host, cfg.pg_port, cfg.pg_database);

    let cancel = CancellationToken::new();
    let mut recorder = Recorder::start(cfg, cancel.clone()).await?;

    info!("recording data... (Ctrl+C to stop)");

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("signal received, stopping...");
            Ok(())
        }
        res = recorder.run() => res,
    };

    recorder.shutdown().await;
    result
}
