use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

pub type RecordId = Uuid;

/// Store-side projection of a received reading. The partition name
/// (`sensor`) travels alongside, derived from the topic the message
/// arrived on.
#[derive(Debug, Clone)]
pub struct SensorDocument {
    pub timestamp: DateTime<Utc>,
    /// Numeric reading; None for the status channel.
    pub value: Option<f64>,
    pub unit: Option<String>,
    /// Full original payload, preserved verbatim.
    pub raw: serde_json::Value,
}

/// Aggregate over one partition's recent window. `avg`/`min`/`max` are
/// None when no document in the window carries a numeric value (the
/// status partition).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub count: i64,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Append-only time-partitioned document store. Documents are never
/// updated or deleted by this system.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Provision the known partitions and their indexes (ascending on
    /// timestamp, composite ascending on timestamp+value). Idempotent;
    /// called on every startup.
    async fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Append one document to the named partition.
    async fn insert(&self, sensor: &str, doc: SensorDocument) -> Result<RecordId, StoreError>;

    /// Statistics over documents with `timestamp >= now - window_hours`.
    /// None when the window holds no documents at all, so absence of
    /// data is distinguishable from zero-valued aggregates.
    async fn aggregate(
        &self,
        sensor: &str,
        window_hours: i64,
    ) -> Result<Option<AggregateStats>, StoreError>;

    /// Best-effort release of the backing connection.
    async fn close(&self);
}

/// Default statistics window, in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;
