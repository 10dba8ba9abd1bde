pub mod error;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreBackend};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{ColumnRef, Embed, JoinKind, Operand, OrderBy, Predicate, SelectQuery, Window};
pub use schema::{ColumnKind, Table};

/// One record as a JSON object keyed by column name. Embeds appear as nested
/// objects under their alias.
pub type Row = Map<String, Value>;

/// Relational store the API runs against.
///
/// Backends must agree on predicate, ordering and null semantics so the same
/// `SelectQuery` yields the same rows on either of them.
#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching the query, ordered and windowed.
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;

    /// Number of rows matching the query, ignoring order and window.
    async fn count(&self, query: &SelectQuery) -> Result<i64, StoreError>;

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Applies `patch` to the row with `id`. `None` when no such row exists.
    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Option<Row>, StoreError>;

    /// Removes the row with `id`, applying on-delete rules. Returns the removed row.
    async fn delete(&self, table: Table, id: Uuid) -> Result<Option<Row>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// First matching row.
    async fn select_one(&self, query: &SelectQuery) -> Result<Option<Row>, StoreError> {
        let mut query = query.clone();
        query.window = Some(Window { offset: 0, limit: 1 });
        Ok(self.select(&query).await?.into_iter().next())
    }
}

/// Rejects keys that are not columns of `table`.
pub fn check_row_columns(table: Table, row: &Row) -> Result<(), StoreError> {
    let schema = table.schema();
    match row.keys().find(|k| !schema.has_column(k)) {
        Some(bad) => Err(StoreError::InvalidQuery(format!("Unknown column {}.{}", table, bad))),
        None => Ok(()),
    }
}

/// Reads a uuid-valued column from a row.
pub fn row_uuid(row: &Row, column: &str) -> Option<Uuid> {
    row.get(column).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

/// Reads a string-valued column from a row.
pub fn row_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

/// Opens the configured backend. A memory store starts from `seed_path` when set.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, StoreError> {
    let store: Arc<dyn Store> = match (config.backend, &config.seed_path) {
        (StoreBackend::Memory, Some(path)) => Arc::new(MemoryStore::from_yaml_file(path).await?),
        (StoreBackend::Memory, None) => Arc::new(MemoryStore::new()),
        (StoreBackend::Postgres, _) => Arc::new(PgStore::connect().await?),
    };
    Ok(store)
}
