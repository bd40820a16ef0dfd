use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::postgresclient::PostgresClient;
use crate::store::{AggregateStats, RecordId, SensorDocument, TimeSeriesStore};

/// Partitions provisioned at startup, one table per sensor. These are
/// the subscriber-side names (note `noiselevel`, see sensorwire).
pub const PARTITIONS: [&str; 4] = ["temperature", "humidity", "noiselevel", "status"];

fn validate_ident(s: &str) -> Result<(), StoreError> {
    let mut chars = s.chars();
    let first = chars
        .next()
        .ok_or_else(|| StoreError::InvalidIdentifier(s.to_string()))?;
    let ok_first = first.is_ascii_alphabetic() || first == '_';
    let ok_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if ok_first && ok_rest {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(s.to_string()))
    }
}

/// Append-only store over one table per partition.
#[derive(Clone)]
pub struct PostgresStore {
    client: PostgresClient,
}

impl PostgresStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TimeSeriesStore for PostgresStore {
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for table in PARTITIONS {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {t} (
                    id     UUID PRIMARY KEY,
                    ts     TIMESTAMPTZ NOT NULL,
                    sensor TEXT NOT NULL,
                    value  DOUBLE PRECISION,
                    unit   TEXT,
                    raw    JSONB NOT NULL
                )
                "#,
                t = table
            );
            self.client.execute(&ddl, &[]).await?;

            // Timestamp index for ordering, composite for window scans
            let ts_idx = format!(
                "CREATE INDEX IF NOT EXISTS {t}_ts_idx ON {t} (ts)",
                t = table
            );
            self.client.execute(&ts_idx, &[]).await?;

            let ts_value_idx = format!(
                "CREATE INDEX IF NOT EXISTS {t}_ts_value_idx ON {t} (ts, value)",
                t = table
            );
            self.client.execute(&ts_value_idx, &[]).await?;
        }
        Ok(())
    }

    async fn insert(&self, sensor: &str, doc: SensorDocument) -> Result<RecordId, StoreError> {
        validate_ident(sensor)?;

        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO {t} (id, ts, sensor, value, unit, raw) VALUES ($1, $2, $3, $4, $5, $6)",
            t = sensor
        );
        self.client
            .execute(
                &sql,
                &[&id, &doc.timestamp, &sensor, &doc.value, &doc.unit, &doc.raw],
            )
            .await?;
        Ok(id)
    }

    async fn aggregate(
        &self,
        sensor: &str,
        window_hours: i64,
    ) -> Result<Option<AggregateStats>, StoreError> {
        validate_ident(sensor)?;

        let cutoff = Utc::now() - chrono::Duration::hours(window_hours);
        let sql = format!(
            "SELECT COUNT(*) AS count, AVG(value) AS avg, MIN(value) AS min, MAX(value) AS max \
             FROM {t} WHERE ts >= $1",
            t = sensor
        );
        let rows = self.client.query(&sql, &[&cutoff]).await?;
        let row = match rows.first() {
            Some(r) => r,
            None => return Ok(None),
        };

        let count: i64 = row.get("count");
        if count == 0 {
            return Ok(None);
        }

        Ok(Some(AggregateStats {
            count,
            avg: row.get("avg"),
            min: row.get("min"),
            max: row.get("max"),
        }))
    }

    async fn close(&self) {
        self.client.close();
    }
}
