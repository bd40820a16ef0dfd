pub mod error;
pub mod memory;
pub mod postgres;
pub mod postgresclient;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use postgresclient::PostgresClient;
pub use store::{AggregateStats, RecordId, SensorDocument, TimeSeriesStore, DEFAULT_WINDOW_HOURS};
