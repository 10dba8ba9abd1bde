//! Generic create/read/update/delete/list over one table.
//!
//! Entity services describe themselves with an `EntityDef` and reuse these
//! steps so every entity shares the same existence checks, audit stamps and
//! error mapping.

use chrono::SecondsFormat;
use serde_json::Value;
use uuid::Uuid;

use crate::api::QueryParams;
use crate::clock::Clock;
use crate::database::{ColumnKind, Embed, Row, SelectQuery, Store, Table};
use crate::error::ApiError;
use crate::filter::{self, ListDef, PageLimits};

#[derive(Debug)]
pub struct EntityDef {
    pub table: Table,
    /// Name used in `<label> not found`.
    pub label: &'static str,
    /// Relations returned with a single row.
    pub detail_embeds: &'static [Embed],
}

pub struct Resource<'a> {
    def: &'static EntityDef,
    store: &'a dyn Store,
    clock: &'a dyn Clock,
}

impl<'a> Resource<'a> {
    pub fn new(def: &'static EntityDef, store: &'a dyn Store, clock: &'a dyn Clock) -> Self {
        Self { def, store, clock }
    }

    pub fn not_found(&self) -> ApiError {
        ApiError::not_found(self.def.label)
    }

    fn now(&self) -> Value {
        Value::String(self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Row with its detail relations.
    pub async fn select_one(&self, id: Uuid) -> Result<Option<Row>, ApiError> {
        let query = SelectQuery::by_id(self.def.table, id).embeds(self.def.detail_embeds);
        Ok(self.store.select_one(&query).await?)
    }

    pub async fn select_404(&self, id: Uuid) -> Result<Row, ApiError> {
        self.select_one(id).await?.ok_or_else(|| self.not_found())
    }

    /// Bare existence check, no relations.
    pub async fn exists_404(&self, id: Uuid) -> Result<Row, ApiError> {
        let query = SelectQuery::by_id(self.def.table, id);
        self.store.select_one(&query).await?.ok_or_else(|| self.not_found())
    }

    /// Inserts `row` with a fresh id and audit timestamps, returning it with relations.
    pub async fn create_one(&self, mut row: Row) -> Result<Row, ApiError> {
        let id = Uuid::new_v4();
        let now = self.now();
        row.insert("id".to_string(), Value::String(id.to_string()));
        if self.def.table.schema().has_column("created_at") {
            row.insert("created_at".to_string(), now.clone());
        }
        if self.def.table.schema().has_column("updated_at") {
            row.insert("updated_at".to_string(), now);
        }
        blanks_to_null(self.def.table, &mut row);

        self.store.insert(self.def.table, row).await?;
        tracing::info!("Created {} {}", self.def.table, id);
        self.select_404(id).await
    }

    /// Checks the target exists, then applies `patch`.
    pub async fn update_404(&self, id: Uuid, mut patch: Row) -> Result<Row, ApiError> {
        self.exists_404(id).await?;

        if self.def.table.schema().has_column("updated_at") {
            patch.insert("updated_at".to_string(), self.now());
        }
        blanks_to_null(self.def.table, &mut patch);

        self.store
            .update(self.def.table, id, patch)
            .await?
            .ok_or_else(|| self.not_found())?;
        tracing::info!("Updated {} {}", self.def.table, id);
        self.select_404(id).await
    }

    /// Hard delete; dependents follow the schema's on-delete rules.
    pub async fn delete_404(&self, id: Uuid) -> Result<Row, ApiError> {
        self.exists_404(id).await?;
        let removed = self
            .store
            .delete(self.def.table, id)
            .await?
            .ok_or_else(|| self.not_found())?;
        tracing::info!("Deleted {} {}", self.def.table, id);
        Ok(removed)
    }

    /// One page of `list` plus the total match count.
    pub async fn list(&self, list: &ListDef, params: &QueryParams, limits: PageLimits) -> Result<(Vec<Row>, i64), ApiError> {
        let composed = filter::compose(list, params, limits)?;
        let rows = self.store.select(&composed.query).await?;
        let count = self.store.count(&composed.query).await?;
        Ok((rows, count))
    }
}

/// Empty strings in non-text columns become null.
fn blanks_to_null(table: Table, row: &mut Row) {
    let schema = table.schema();
    for (key, value) in row.iter_mut() {
        let is_text = schema.column(key).map_or(true, |c| c.kind == ColumnKind::Text);
        if !is_text && value.as_str().is_some_and(|s| s.trim().is_empty()) {
            *value = Value::Null;
        }
    }
}

/// `first last`, trimmed, falling back to email. `None` when the relation is absent.
pub fn display_name(person: Option<&Value>) -> Option<String> {
    let person = person?.as_object()?;
    let part = |k: &str| person.get(k).and_then(Value::as_str).unwrap_or("");
    let full = format!("{} {}", part("first_name"), part("last_name"));
    let full = full.trim();
    if !full.is_empty() {
        return Some(full.to_string());
    }
    person.get("email").and_then(Value::as_str).map(str::to_string)
}

/// Field of an embedded relation, or `default` when absent.
pub fn embedded_str(row: &Row, alias: &str, field: &str, default: &str) -> Value {
    row.get(alias)
        .and_then(|r| r.get(field))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| Value::String(default.to_string()), |s| Value::String(s.to_string()))
}

/// Copies `columns` from `row` into a new object, null when missing.
pub fn pick(row: &Row, columns: &[&str]) -> Row {
    columns
        .iter()
        .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Unwraps a `json!` object literal.
pub fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// Rejects explicit nulls for columns that must always hold a value.
pub fn reject_nulls(body: &Row, fields: &[&str]) -> Result<(), ApiError> {
    match fields.iter().find(|f| body.get(**f).is_some_and(Value::is_null)) {
        Some(field) => Err(ApiError::validation(format!("{} cannot be null", field))),
        None => Ok(()),
    }
}

/// Deserializes a request object into a typed body.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &Row) -> Result<T, ApiError> {
    Ok(serde_json::from_value(Value::Object(body.clone()))?)
}
