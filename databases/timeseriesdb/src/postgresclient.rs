use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;

use crate::error::StoreError;

/// Thin shared handle over one tokio-postgres connection. The connection
/// future is driven by a background task for the lifetime of the client.
#[derive(Clone)]
pub struct PostgresClient {
    client: Arc<Client>,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PostgresClient {
    /// Connect and verify the server answers within `timeout`. Startup
    /// aborts on failure, so an unreachable store never gets further
    /// than this call.
    pub async fn connect(pg_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let connect = tokio_postgres::connect(pg_url, NoTls);
        let (client, connection) = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| StoreError::ConnectionTimeout(timeout))??;

        // Drive the connection in the background
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {e}");
            }
        });

        let this = Self {
            client: Arc::new(client),
            driver: Arc::new(Mutex::new(Some(driver))),
        };

        // Readiness check, bounded by the same budget
        tokio::time::timeout(timeout, this.client.simple_query("SELECT 1"))
            .await
            .map_err(|_| StoreError::ConnectionTimeout(timeout))??;

        Ok(this)
    }

    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64, StoreError> {
        self.client.execute(sql, params).await.map_err(StoreError::Postgres)
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        self.client.query(sql, params).await.map_err(StoreError::Postgres)
    }

    /// Stop the background driver. Further calls on this client fail
    /// with a closed-connection error from the driver side.
    pub fn close(&self) {
        if let Ok(mut guard) = self.driver.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
