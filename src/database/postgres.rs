//! PostgreSQL `Store` backed by sqlx.
//!
//! Rows travel as JSON: reads wrap each result in `to_jsonb`, writes go
//! through `jsonb_populate_record`. Every identifier comes from the static
//! schema; request data only ever reaches the database as bound parameters.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use tracing::debug;
use uuid::Uuid;

use super::error::StoreError;
use super::manager::DatabaseManager;
use super::query::{ColumnRef, JoinKind, Operand, Predicate, SelectQuery};
use super::schema::{ColumnKind, Table};
use super::{check_row_columns, Row, Store};

#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(Option<String>),
    TextList(Vec<String>),
    Json(Value),
}

/// Compiled statement plus its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    binds: Vec<Bind>,
}

impl CompiledSql {
    fn query(&self) -> Query<'_, Postgres, PgArguments> {
        let mut q = sqlx::query(&self.sql);
        for bind in &self.binds {
            q = match bind {
                Bind::Text(v) => q.bind(v.clone()),
                Bind::TextList(v) => q.bind(v.clone()),
                Bind::Json(v) => q.bind(v.clone()),
            };
        }
        q
    }

    pub fn param_count(&self) -> usize {
        self.binds.len()
    }
}

struct SqlBuilder<'q> {
    query: &'q SelectQuery,
    binds: Vec<Bind>,
}

impl<'q> SqlBuilder<'q> {
    fn new(query: &'q SelectQuery) -> Self {
        Self { query, binds: vec![] }
    }

    fn param(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.binds.len())
    }

    fn alias(&self, relation: Option<&str>) -> Result<String, StoreError> {
        match relation {
            None => Ok("t".to_string()),
            Some(name) => self
                .query
                .embeds
                .iter()
                .position(|e| e.alias == name)
                .map(|i| format!("e{}", i))
                .ok_or_else(|| StoreError::InvalidQuery(format!("Unknown relation: {}", name))),
        }
    }

    fn column(&self, column: &ColumnRef) -> Result<(String, ColumnKind), StoreError> {
        let table = self
            .query
            .resolve(column)
            .ok_or_else(|| StoreError::InvalidQuery(format!("Unknown column {}", column.column)))?;
        let kind = table
            .schema()
            .column(column.column)
            .map(|c| c.kind)
            .ok_or_else(|| StoreError::InvalidQuery(format!("Unknown column {}.{}", table, column.column)))?;
        Ok((format!("{}.{}", self.alias(column.relation)?, quote(column.column)), kind))
    }

    fn projection(&self) -> String {
        let base = match &self.query.columns {
            None => "to_jsonb(t)".to_string(),
            Some(columns) => json_object("t", columns),
        };
        let mut parts = vec![base];
        for (i, embed) in self.query.embeds.iter().enumerate() {
            let alias = format!("e{}", i);
            parts.push(format!(
                "jsonb_build_object('{}', CASE WHEN {}.\"id\" IS NULL THEN NULL ELSE {} END)",
                embed.alias,
                alias,
                json_object(&alias, embed.columns)
            ));
        }
        parts.join(" || ")
    }

    fn from_clause(&self) -> String {
        let mut sql = format!("FROM {} AS t", quote(self.query.table.name()));
        for (i, embed) in self.query.embeds.iter().enumerate() {
            let join = match embed.join {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(
                " {} {} AS e{} ON e{}.\"id\" = t.{}",
                join,
                quote(embed.table.name()),
                i,
                i,
                quote(embed.foreign_key)
            ));
        }
        sql
    }

    fn where_clause(&mut self) -> Result<String, StoreError> {
        let mut conditions = Vec::with_capacity(self.query.predicates.len());
        for predicate in &self.query.predicates {
            conditions.push(self.predicate(predicate)?);
        }
        if conditions.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("WHERE {}", conditions.join(" AND ")))
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String, StoreError> {
        match predicate {
            Predicate::AnyOf(inner) => {
                if inner.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let mut parts = Vec::with_capacity(inner.len());
                for p in inner {
                    parts.push(self.predicate(p)?);
                }
                Ok(format!("({})", parts.join(" OR ")))
            }
            Predicate::Where(column, operand) => {
                let (expr, kind) = self.column(column)?;
                let lhs = if kind == ColumnKind::Enum { format!("{}::text", expr) } else { expr.clone() };
                let cast = kind.param_type();
                Ok(match operand {
                    Operand::IsNull => format!("{} IS NULL", expr),
                    Operand::NotNull => format!("{} IS NOT NULL", expr),
                    Operand::Eq(Value::Null) => format!("{} IS NULL", expr),
                    Operand::Eq(v) => format!("{} = {}::{}", lhs, self.param(Bind::Text(text_of(v))), cast),
                    Operand::In(values) if values.is_empty() => "FALSE".to_string(),
                    Operand::In(values) => {
                        let list = values.iter().filter_map(text_of).collect();
                        format!("{} = ANY({}::text[]::{}[])", lhs, self.param(Bind::TextList(list)), cast)
                    }
                    Operand::Gte(v) => format!("{} >= {}::{}", lhs, self.param(Bind::Text(text_of(v))), cast),
                    Operand::Lte(v) => format!("{} <= {}::{}", lhs, self.param(Bind::Text(text_of(v))), cast),
                    Operand::Contains(needle) => {
                        let pattern = format!("%{}%", escape_like(needle));
                        format!("{}::text ILIKE {}", expr, self.param(Bind::Text(Some(pattern))))
                    }
                })
            }
        }
    }

    fn order_clause(&self) -> Result<String, StoreError> {
        if self.query.order.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.query.order.len());
        for order in &self.query.order {
            let (expr, _) = self.column(&order.column)?;
            parts.push(format!(
                "{} {} {}",
                expr,
                if order.descending { "DESC" } else { "ASC" },
                if order.nulls_first { "NULLS FIRST" } else { "NULLS LAST" }
            ));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

/// Window bounds are rendered inline and must fit a Postgres bigint.
const BIGINT_MAX: u64 = i64::MAX as u64;

pub fn compile_select(query: &SelectQuery) -> Result<CompiledSql, StoreError> {
    query.validate()?;
    let mut builder = SqlBuilder::new(query);
    let where_clause = builder.where_clause()?;
    let limit_clause = match query.window {
        Some(w) => format!("LIMIT {} OFFSET {}", w.limit.min(BIGINT_MAX), w.offset.min(BIGINT_MAX)),
        None => String::new(),
    };
    let sql = [
        format!("SELECT {} AS row", builder.projection()),
        builder.from_clause(),
        where_clause,
        builder.order_clause()?,
        limit_clause,
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    Ok(CompiledSql { sql, binds: builder.binds })
}

pub fn compile_count(query: &SelectQuery) -> Result<CompiledSql, StoreError> {
    query.validate()?;
    let mut builder = SqlBuilder::new(query);
    let where_clause = builder.where_clause()?;
    let sql = [
        "SELECT COUNT(*) AS count".to_string(),
        builder.from_clause(),
        where_clause,
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    Ok(CompiledSql { sql, binds: builder.binds })
}

pub fn compile_insert(table: Table, row: &Row) -> Result<CompiledSql, StoreError> {
    check_row_columns(table, row)?;
    let name = quote(table.name());
    if row.is_empty() {
        return Ok(CompiledSql {
            sql: format!("INSERT INTO {} AS t DEFAULT VALUES RETURNING to_jsonb(t) AS row", name),
            binds: vec![],
        });
    }
    let columns = column_list(row);
    Ok(CompiledSql {
        sql: format!(
            "INSERT INTO {name} AS t ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $1::jsonb) RETURNING to_jsonb(t) AS row"
        ),
        binds: vec![Bind::Json(Value::Object(row.clone()))],
    })
}

pub fn compile_update(table: Table, id: Uuid, patch: &Row) -> Result<CompiledSql, StoreError> {
    check_row_columns(table, patch)?;
    if patch.contains_key("id") {
        return Err(StoreError::InvalidQuery("Primary key cannot be updated".to_string()));
    }
    let name = quote(table.name());
    let columns = column_list(patch);
    let target = if patch.len() == 1 { columns.clone() } else { format!("({})", columns) };
    Ok(CompiledSql {
        sql: format!(
            "UPDATE {name} AS t SET {target} = (SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $1::jsonb)) WHERE t.\"id\" = $2::uuid RETURNING to_jsonb(t) AS row"
        ),
        binds: vec![Bind::Json(Value::Object(patch.clone())), Bind::Text(Some(id.to_string()))],
    })
}

pub fn compile_delete(table: Table, id: Uuid) -> CompiledSql {
    CompiledSql {
        sql: format!(
            "DELETE FROM {} AS t WHERE t.\"id\" = $1::uuid RETURNING to_jsonb(t) AS row",
            quote(table.name())
        ),
        binds: vec![Bind::Text(Some(id.to_string()))],
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn json_object(alias: &str, columns: &[&str]) -> String {
    let pairs: Vec<String> = columns
        .iter()
        .map(|c| format!("'{}', {}.{}", c, alias, quote(c)))
        .collect();
    format!("jsonb_build_object({})", pairs.join(", "))
}

fn column_list(row: &Row) -> String {
    row.keys().map(|k| quote(k)).collect::<Vec<_>>().join(", ")
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn into_row(value: Value) -> Result<Row, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::MalformedRow(format!("expected object, got {}", other))),
    }
}

pub struct PgStore {
    pool: PgPool,
    log_queries: bool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            log_queries: crate::config::config().database.enable_query_logging,
        }
    }

    /// Store over the process-wide pool.
    pub async fn connect() -> Result<Self, StoreError> {
        Ok(Self::new(DatabaseManager::pool().await?))
    }

    fn log(&self, compiled: &CompiledSql) {
        if self.log_queries {
            debug!(sql = %compiled.sql, params = compiled.param_count(), "executing query");
        }
    }

    async fn fetch_rows(&self, compiled: &CompiledSql) -> Result<Vec<Row>, StoreError> {
        self.log(compiled);
        let rows = compiled.query().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| into_row(r.try_get::<Value, _>("row")?))
            .collect()
    }

    async fn fetch_optional_row(&self, compiled: &CompiledSql) -> Result<Option<Row>, StoreError> {
        self.log(compiled);
        match compiled.query().fetch_optional(&self.pool).await? {
            Some(r) => Ok(Some(into_row(r.try_get::<Value, _>("row")?)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        self.fetch_rows(&compile_select(query)?).await
    }

    async fn count(&self, query: &SelectQuery) -> Result<i64, StoreError> {
        let compiled = compile_count(query)?;
        self.log(&compiled);
        let row = compiled.query().fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let compiled = compile_insert(table, &row)?;
        self.fetch_optional_row(&compiled)
            .await?
            .ok_or_else(|| StoreError::MalformedRow(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Option<Row>, StoreError> {
        if patch.is_empty() {
            return self.select_one(&SelectQuery::by_id(table, id)).await;
        }
        self.fetch_optional_row(&compile_update(table, id, &patch)?).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<Option<Row>, StoreError> {
        self.fetch_optional_row(&compile_delete(table, id)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
