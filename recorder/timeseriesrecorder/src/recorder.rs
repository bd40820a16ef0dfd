use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use timeseriesdb::{
    AggregateStats, PostgresClient, PostgresStore, StoreError, TimeSeriesStore,
    DEFAULT_WINDOW_HOURS,
};

use crate::config::RecorderConfig;
use crate::router::SubscriptionRouter;

/// Lifecycle controller for the recorder process.
///
/// Acquire order: store first (readiness check + index provisioning must
/// succeed or startup aborts), bus second. Release order is the reverse:
/// stop receiving, disconnect the bus, close the store — every step
/// best-effort even when an earlier one failed.
pub struct Recorder {
    router: SubscriptionRouter,
    store: Arc<dyn TimeSeriesStore>,
    cancel: CancellationToken,
    stopped: AtomicBool,
}

impl Recorder {
    /// Connect to Postgres and bring up the full pipeline.
    pub async fn start(cfg: RecorderConfig, cancel: CancellationToken) -> Result<Self> {
        let client = PostgresClient::connect(&cfg.pg_url(), cfg.store_connect_timeout)
            .await
            .context("store unreachable, aborting startup")?;
        let store: Arc<dyn TimeSeriesStore> = Arc::new(PostgresStore::new(client));

        Self::with_store(cfg, store, cancel).await
    }

    /// Bring up the pipeline over an already-built store. The store must
    /// be ready before the bus connection is opened, never after.
    pub async fn with_store(
        cfg: RecorderConfig,
        store: Arc<dyn TimeSeriesStore>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        store
            .ensure_indexes()
            .await
            .context("index provisioning failed, aborting startup")?;
        info!("store ready, partitions provisioned");

        let router = SubscriptionRouter::connect(&cfg, store.clone(), cancel.clone());

        Ok(Self {
            router,
            store,
            cancel,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Blocks in the receive-dispatch loop until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.router.run().await
    }

    /// Statistics for one sensor over the last `window_hours` (24 when
    /// unspecified). None means the window holds no documents.
    pub async fn statistics(
        &self,
        sensor: &str,
        window_hours: Option<i64>,
    ) -> Result<Option<AggregateStats>, StoreError> {
        self.store
            .aggregate(sensor, window_hours.unwrap_or(DEFAULT_WINDOW_HOURS))
            .await
    }

    /// Idempotent: the second call finds the flag set and does nothing.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        if let Err(e) = self.router.disconnect().await {
            warn!("bus disconnect failed: {e:#}");
        }
        self.store.close().await;
        info!("recorder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeseriesdb::MemoryStore;

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let recorder = Recorder::with_store(RecorderConfig::default(), store, cancel.clone())
            .await
            .unwrap();

        recorder.shutdown().await;
        assert!(cancel.is_cancelled());
        // Second call must be a no-op, not an error.
        recorder.shutdown().await;
    }

    #[tokio::test]
    async fn test_statistics_uses_default_window() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::with_store(
            RecorderConfig::default(),
            store.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(recorder.statistics("humidity", None).await.unwrap().is_none());

        store
            .insert(
                "humidity",
                timeseriesdb::SensorDocument {
                    timestamp: chrono::Utc::now(),
                    value: Some(60.0),
                    unit: Some("%".to_string()),
                    raw: serde_json::json!({"value": 60.0}),
                },
            )
            .await
            .unwrap();

        let stats = recorder.statistics("humidity", None).await.unwrap().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.avg, Some(60.0));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let mut recorder = Recorder::with_store(RecorderConfig::default(), store, cancel.clone())
            .await
            .unwrap();

        cancel.cancel();
        // No broker is running; the loop must still exit promptly on
        // the already-cancelled token.
        tokio::time::timeout(std::time::Duration::from_secs(3), recorder.run())
            .await
            .expect("run did not observe cancellation")
            .unwrap();
    }
}
