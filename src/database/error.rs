use thiserror::Error;

/// Failures raised by a `Store` backend or by the connection manager.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Seed error: {0}")]
    Seed(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
