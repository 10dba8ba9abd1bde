//! In-process `Store` used by the test suite and by `STORE_BACKEND=memory`.
//!
//! Semantics follow the PostgreSQL backend: SQL-style null handling in
//! predicates, ASC NULLS LAST / DESC NULLS FIRST unless the query says
//! otherwise, foreign keys checked on write, and on-delete rules applied
//! transitively.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::StoreError;
use super::query::{ColumnRef, JoinKind, Operand, OrderBy, Predicate, SelectQuery};
use super::schema::{ColumnKind, OnDelete, Table, TableSchema};
use super::{check_row_columns, Row, Store};

type Tables = HashMap<Table, Vec<Row>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a YAML document mapping table names to row lists.
    pub fn from_yaml(text: &str) -> Result<Self, StoreError> {
        let seed: BTreeMap<String, Vec<Value>> =
            serde_yaml::from_str(text).map_err(|e| StoreError::Seed(e.to_string()))?;

        let mut tables = Tables::new();
        // Parents first so foreign keys resolve in any document order.
        let mut ordered: Vec<(Table, Vec<Value>)> = Vec::with_capacity(seed.len());
        for (name, rows) in seed {
            let table = Table::from_name(&name)
                .ok_or_else(|| StoreError::Seed(format!("Unknown table: {}", name)))?;
            ordered.push((table, rows));
        }
        ordered.sort_by_key(|(table, _)| *table);

        for (table, rows) in ordered {
            for value in rows {
                let Value::Object(row) = value else {
                    return Err(StoreError::Seed(format!("Rows in {} must be mappings", table)));
                };
                insert_row(&mut tables, table, row).map_err(|e| StoreError::Seed(e.to_string()))?;
            }
        }

        Ok(Self { tables: RwLock::new(tables) })
    }

    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let store = Self::from_yaml(&text)?;
        info!("Loaded memory store seed from {}", path.display());
        Ok(store)
    }

    /// Number of rows currently held for `table`.
    pub async fn len(&self, table: Table) -> usize {
        self.tables.read().await.get(&table).map_or(0, Vec::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        query.validate()?;
        let tables = self.tables.read().await;
        let joined = matching(&tables, query);
        let (offset, limit) = match query.window {
            Some(w) => (w.offset as usize, w.limit as usize),
            None => (0, usize::MAX),
        };
        let rows: Vec<Row> = joined
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|j| project(query, &j))
            .collect();
        debug!("memory select on {} returned {} rows", query.table, rows.len());
        Ok(rows)
    }

    async fn count(&self, query: &SelectQuery) -> Result<i64, StoreError> {
        query.validate()?;
        let tables = self.tables.read().await;
        Ok(matching(&tables, query).len() as i64)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().await;
        insert_row(&mut tables, table, row)
    }

    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Option<Row>, StoreError> {
        check_row_columns(table, &patch)?;
        if patch.contains_key("id") {
            return Err(StoreError::InvalidQuery("Primary key cannot be updated".to_string()));
        }

        let mut tables = self.tables.write().await;
        let id = id.to_string();
        let Some(current) = tables.get(&table).and_then(|rows| rows.iter().find(|r| has_id(r, &id))) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        for (k, v) in patch {
            updated.insert(k, v);
        }
        check_foreign_keys(&tables, table, &updated)?;

        let rows = tables.entry(table).or_default();
        if let Some(slot) = rows.iter_mut().find(|r| has_id(r, &id)) {
            *slot = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<Option<Row>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(delete_cascading(&mut tables, table, &id.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Base row plus the matched row for each embed, aligned with `query.embeds`.
struct Joined<'a> {
    base: &'a Row,
    related: Vec<Option<&'a Row>>,
}

impl<'a> Joined<'a> {
    fn value(&self, query: &SelectQuery, column: &ColumnRef) -> Option<&'a Value> {
        let row = match column.relation {
            None => Some(self.base),
            Some(alias) => {
                let idx = query.embeds.iter().position(|e| e.alias == alias)?;
                self.related[idx]
            }
        };
        row.and_then(|r| r.get(column.column)).filter(|v| !v.is_null())
    }
}

fn matching<'a>(tables: &'a Tables, query: &SelectQuery) -> Vec<Joined<'a>> {
    let Some(base_rows) = tables.get(&query.table) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    'rows: for base in base_rows {
        let mut related = Vec::with_capacity(query.embeds.len());
        for embed in &query.embeds {
            let target = base
                .get(embed.foreign_key)
                .and_then(Value::as_str)
                .and_then(|fk| tables.get(&embed.table)?.iter().find(|r| has_id(r, fk)));
            if target.is_none() && embed.join == JoinKind::Inner {
                continue 'rows;
            }
            related.push(target);
        }
        let joined = Joined { base, related };
        if query.predicates.iter().all(|p| evaluate(query, &joined, p)) {
            out.push(joined);
        }
    }

    out.sort_by(|a, b| order_rows(query, a, b));
    out
}

fn evaluate(query: &SelectQuery, row: &Joined<'_>, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::AnyOf(inner) => inner.iter().any(|p| evaluate(query, row, p)),
        Predicate::Where(column, operand) => {
            let kind = column_kind(query, column);
            let value = row.value(query, column);
            match operand {
                Operand::IsNull => value.is_none(),
                Operand::NotNull => value.is_some(),
                Operand::Eq(expected) => value.is_some_and(|v| equals(kind, v, expected)),
                Operand::In(options) => value.is_some_and(|v| options.iter().any(|o| equals(kind, v, o))),
                Operand::Gte(bound) => value.is_some_and(|v| {
                    matches!(compare(kind, v, bound), Some(Ordering::Greater | Ordering::Equal))
                }),
                Operand::Lte(bound) => value.is_some_and(|v| {
                    matches!(compare(kind, v, bound), Some(Ordering::Less | Ordering::Equal))
                }),
                Operand::Contains(needle) => value.is_some_and(|v| {
                    let hay = match v {
                        Value::String(s) => s.to_lowercase(),
                        other => other.to_string().to_lowercase(),
                    };
                    hay.contains(&needle.to_lowercase())
                }),
            }
        }
    }
}

fn order_rows(query: &SelectQuery, a: &Joined<'_>, b: &Joined<'_>) -> Ordering {
    for order in &query.order {
        let ord = order_one(query, order, a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn order_one(query: &SelectQuery, order: &OrderBy, a: &Joined<'_>, b: &Joined<'_>) -> Ordering {
    let kind = column_kind(query, &order.column);
    match (a.value(query, &order.column), b.value(query, &order.column)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) if order.nulls_first => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) if order.nulls_first => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = compare(kind, x, y).unwrap_or(Ordering::Equal);
            if order.descending { ord.reverse() } else { ord }
        }
    }
}

fn column_kind(query: &SelectQuery, column: &ColumnRef) -> ColumnKind {
    query
        .resolve(column)
        .and_then(|t| t.schema().column(column.column))
        .map_or(ColumnKind::Text, |c| c.kind)
}

fn compare(kind: ColumnKind, a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) if kind == ColumnKind::Uuid => {
            Some(x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equals(kind: ColumnKind, a: &Value, b: &Value) -> bool {
    compare(kind, a, b) == Some(Ordering::Equal) || a == b
}

fn has_id(row: &Row, id: &str) -> bool {
    row.get("id").and_then(Value::as_str).is_some_and(|v| v.eq_ignore_ascii_case(id))
}

fn project(query: &SelectQuery, joined: &Joined<'_>) -> Row {
    let mut out = match &query.columns {
        Some(columns) => columns
            .iter()
            .map(|c| (c.to_string(), joined.base.get(*c).cloned().unwrap_or(Value::Null)))
            .collect(),
        None => joined.base.clone(),
    };
    for (embed, related) in query.embeds.iter().zip(&joined.related) {
        let value = match related {
            Some(row) => Value::Object(
                embed
                    .columns
                    .iter()
                    .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                    .collect(),
            ),
            None => Value::Null,
        };
        out.insert(embed.alias.to_string(), value);
    }
    out
}

fn insert_row(tables: &mut Tables, table: Table, row: Row) -> Result<Row, StoreError> {
    check_row_columns(table, &row)?;

    let mut full = Row::new();
    for column in table.schema().columns {
        full.insert(column.name.to_string(), row.get(column.name).cloned().unwrap_or(Value::Null));
    }
    let id = match full.get("id").and_then(Value::as_str) {
        Some(id) => Uuid::parse_str(id)
            .map_err(|_| StoreError::InvalidQuery(format!("invalid input syntax for type uuid: \"{}\"", id)))?
            .to_string(),
        None => Uuid::new_v4().to_string(),
    };
    full.insert("id".to_string(), Value::String(id.clone()));

    if tables.get(&table).is_some_and(|rows| rows.iter().any(|r| has_id(r, &id))) {
        return Err(StoreError::InvalidQuery(format!(
            "duplicate key value violates unique constraint \"{}_pkey\"",
            table
        )));
    }
    check_foreign_keys(tables, table, &full)?;

    tables.entry(table).or_default().push(full.clone());
    Ok(full)
}

fn check_foreign_keys(tables: &Tables, table: Table, row: &Row) -> Result<(), StoreError> {
    for fk in table.schema().foreign_keys {
        let Some(target) = row.get(fk.column).and_then(Value::as_str) else {
            continue;
        };
        let exists = tables
            .get(&fk.references)
            .is_some_and(|rows| rows.iter().any(|r| has_id(r, target)));
        if !exists {
            return Err(StoreError::InvalidQuery(format!(
                "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
                table, table, fk.column
            )));
        }
    }
    Ok(())
}

fn delete_cascading(tables: &mut Tables, table: Table, id: &str) -> Option<Row> {
    let rows = tables.get_mut(&table)?;
    let pos = rows.iter().position(|r| has_id(r, id))?;
    let removed = rows.remove(pos);

    let mut pending = vec![(table, id.to_string())];
    while let Some((parent, parent_id)) = pending.pop() {
        for (schema, fk) in TableSchema::referencing(parent) {
            let Some(children) = tables.get_mut(&schema.table) else {
                continue;
            };
            let points_at_parent = |row: &Row| {
                row.get(fk.column)
                    .and_then(Value::as_str)
                    .is_some_and(|v| v.eq_ignore_ascii_case(&parent_id))
            };
            match fk.on_delete {
                OnDelete::Cascade => children.retain(|row| {
                    if !points_at_parent(row) {
                        return true;
                    }
                    if let Some(child_id) = row.get("id").and_then(Value::as_str) {
                        pending.push((schema.table, child_id.to_string()));
                    }
                    false
                }),
                OnDelete::SetNull => {
                    for row in children.iter_mut().filter(|r| points_at_parent(r)) {
                        row.insert(fk.column.to_string(), Value::Null);
                    }
                }
            }
        }
    }
    Some(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::query::Embed;
    use serde_json::json;

    const SEED: &str = r#"
users:
  - id: 00000000-0000-0000-0000-0000000000a1
    email: lead@school.test
    first_name: Ana
    last_name: Lead
    role: SSS_STAFF
students:
  - id: 00000000-0000-0000-0000-0000000000b1
    name: Beth
    grade: G5
  - id: 00000000-0000-0000-0000-0000000000b2
    name: Carl
    grade: G7
cases:
  - id: 00000000-0000-0000-0000-0000000000c1
    student_id: 00000000-0000-0000-0000-0000000000b1
    case_type: SEL
    status: OPEN
    tier: 2
    is_urgent: true
    opened_date: "2024-09-01"
    case_manager_id: 00000000-0000-0000-0000-0000000000a1
  - id: 00000000-0000-0000-0000-0000000000c2
    student_id: 00000000-0000-0000-0000-0000000000b2
    case_type: BULLYING
    status: CLOSED
    is_urgent: false
    opened_date: "2024-08-01"
interventions:
  - id: 00000000-0000-0000-0000-0000000000d1
    case_id: 00000000-0000-0000-0000-0000000000c1
    type: SEL
    intervention_name: Check-in
    start_date: "2024-09-02"
    is_active: true
sessions:
  - id: 00000000-0000-0000-0000-0000000000e1
    intervention_id: 00000000-0000-0000-0000-0000000000d1
    session_date: "2024-09-03"
"#;

    const STUDENT: Embed = Embed::left("student", Table::Students, "student_id", &["id", "name", "grade"]);

    fn id(n: &str) -> Uuid {
        Uuid::parse_str(&format!("00000000-0000-0000-0000-0000000000{}", n)).unwrap()
    }

    #[tokio::test]
    async fn seeds_and_fills_missing_columns() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        assert_eq!(store.len(Table::Cases).await, 2);
        let row = store.select_one(&SelectQuery::by_id(Table::Cases, id("c2"))).await.unwrap().unwrap();
        assert_eq!(row["tier"], Value::Null);
        assert_eq!(row["closure_reason"], Value::Null);
    }

    #[tokio::test]
    async fn filters_through_embeds_and_orders_nulls() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        let query = SelectQuery::table(Table::Cases)
            .embed(STUDENT.inner())
            .filter(ColumnRef::on("student", "name"), Operand::Contains("BET".into()));
        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["student"]["grade"], json!("G5"));

        let by_tier_desc = SelectQuery::table(Table::Cases).order_by(OrderBy::desc(ColumnRef::base("tier")));
        let rows = store.select(&by_tier_desc).await.unwrap();
        assert_eq!(rows[0]["tier"], Value::Null, "DESC puts nulls first");

        let by_tier_asc = SelectQuery::table(Table::Cases).order_by(OrderBy::asc(ColumnRef::base("tier")));
        let rows = store.select(&by_tier_asc).await.unwrap();
        assert_eq!(rows[0]["tier"], json!(2), "ASC puts nulls last");
    }

    #[tokio::test]
    async fn count_ignores_window() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        let query = SelectQuery::table(Table::Cases).window(1, 1);
        assert_eq!(store.count(&query).await.unwrap(), 2);
        assert_eq!(store.select(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn null_never_matches_equality() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        let query = SelectQuery::table(Table::Cases).is_in("tier", vec![json!(1), json!(3)]);
        assert_eq!(store.count(&query).await.unwrap(), 0);
        let query = SelectQuery::table(Table::Cases).eq("tier", 2);
        assert_eq!(store.count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_dangling_foreign_keys() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        let mut row = Row::new();
        row.insert("student_id".into(), json!(Uuid::new_v4().to_string()));
        row.insert("case_type".into(), json!("SEL"));
        assert!(store.insert(Table::Cases, row).await.is_err());
        assert_eq!(store.len(Table::Cases).await, 2);
    }

    #[tokio::test]
    async fn delete_cascades_and_nulls_references() {
        let store = MemoryStore::from_yaml(SEED).unwrap();

        let removed = store.delete(Table::Interventions, id("d1")).await.unwrap();
        assert!(removed.is_some());
        assert_eq!(store.len(Table::Sessions).await, 0);

        store.delete(Table::Users, id("a1")).await.unwrap();
        let case = store.select_one(&SelectQuery::by_id(Table::Cases, id("c1"))).await.unwrap().unwrap();
        assert_eq!(case["case_manager_id"], Value::Null);
    }

    #[tokio::test]
    async fn update_merges_patch() {
        let store = MemoryStore::from_yaml(SEED).unwrap();
        let mut patch = Row::new();
        patch.insert("status".into(), json!("ON_HOLD"));
        let row = store.update(Table::Cases, id("c1"), patch).await.unwrap().unwrap();
        assert_eq!(row["status"], json!("ON_HOLD"));
        assert_eq!(row["case_type"], json!("SEL"));

        let missing = store.update(Table::Cases, Uuid::new_v4(), Row::new()).await.unwrap();
        assert!(missing.is_none());
    }
}
