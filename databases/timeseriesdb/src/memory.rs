use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{AggregateStats, RecordId, SensorDocument, TimeSeriesStore};

/// In-process store with the same semantics as the Postgres backend.
/// Used by the test suites and handy for broker-only local runs.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Vec<(RecordId, SensorDocument)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn partition_len(&self, sensor: &str) -> usize {
        let guard = self.partitions.read().await;
        guard.get(sensor).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn documents(&self, sensor: &str) -> Vec<SensorDocument> {
        let guard = self.partitions.read().await;
        guard
            .get(sensor)
            .map(|v| v.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn partition_names(&self) -> Vec<String> {
        let guard = self.partitions.read().await;
        guard.keys().cloned().collect()
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        // Nothing to provision; partitions appear on first insert.
        Ok(())
    }

    async fn insert(&self, sensor: &str, doc: SensorDocument) -> Result<RecordId, StoreError> {
        let id = Uuid::new_v4();
        let mut guard = self.partitions.write().await;
        guard.entry(sensor.to_string()).or_default().push((id, doc));
        Ok(id)
    }

    async fn aggregate(
        &self,
        sensor: &str,
        window_hours: i64,
    ) -> Result<Option<AggregateStats>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::hours(window_hours);
        let guard = self.partitions.read().await;

        let docs: Vec<&SensorDocument> = guard
            .get(sensor)
            .map(|v| v.iter().map(|(_, d)| d).filter(|d| d.timestamp >= cutoff).collect())
            .unwrap_or_default();

        if docs.is_empty() {
            return Ok(None);
        }

        let values: Vec<f64> = docs.iter().filter_map(|d| d.value).collect();
        let (avg, min, max) = if values.is_empty() {
            (None, None, None)
        } else {
            let sum: f64 = values.iter().sum();
            (
                Some(sum / values.len() as f64),
                Some(values.iter().cloned().fold(f64::INFINITY, f64::min)),
                Some(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            )
        };

        Ok(Some(AggregateStats {
            count: docs.len() as i64,
            avg,
            min,
            max,
        }))
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn doc(value: Option<f64>, timestamp: DateTime<Utc>) -> SensorDocument {
        SensorDocument {
            timestamp,
            value,
            unit: None,
            raw: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_aggregate_empty_partition_is_none() {
        let store = MemoryStore::new();
        let stats = store.aggregate("temperature", 24).await.unwrap();
        assert!(stats.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_matches_hand_computed_reference() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for v in [10.0, 20.0, 30.0] {
            store.insert("temperature", doc(Some(v), now)).await.unwrap();
        }

        let stats = store.aggregate("temperature", 24).await.unwrap().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.avg, Some(20.0));
        assert_eq!(stats.min, Some(10.0));
        assert_eq!(stats.max, Some(30.0));
    }

    #[tokio::test]
    async fn test_aggregate_excludes_documents_outside_window() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert("humidity", doc(Some(50.0), now)).await.unwrap();
        store
            .insert("humidity", doc(Some(99.0), now - Duration::hours(48)))
            .await
            .unwrap();

        let stats = store.aggregate("humidity", 24).await.unwrap().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max, Some(50.0));

        // Wider window picks up the old document too
        let stats = store.aggregate("humidity", 72).await.unwrap().unwrap();
        assert_eq!(stats.count, 2);
    }

    #[tokio::test]
    async fn test_aggregate_status_partition_counts_without_values() {
        let store = MemoryStore::new();
        store.insert("status", doc(None, Utc::now())).await.unwrap();

        let stats = store.aggregate("status", 24).await.unwrap().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.avg, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
    }

    #[tokio::test]
    async fn test_ensure_indexes_idempotent() {
        let store = MemoryStore::new();
        store.ensure_indexes().await.unwrap();
        store.ensure_indexes().await.unwrap();
    }
}
