use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unreachable within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("invalid identifier '{0}' (only [A-Za-z_][A-Za-z0-9_]* allowed)")]
    InvalidIdentifier(String),

    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    #[error("store connection closed")]
    Closed,
}
