//! Child-row counts merged onto a page of parent rows.
//!
//! Each count is a separate read that fetches only foreign-key columns and
//! groups them in memory, so one-to-many joins never multiply parent rows.
//! The read is not transactional with the parent read; counts can trail a
//! concurrent insert or delete.

use std::collections::HashMap;

use serde_json::Value;

use crate::database::{row_str, Row, SelectQuery, Store, StoreError, Table};

/// One count written onto each parent row.
#[derive(Debug, Clone, Copy)]
pub struct Tally {
    pub field: &'static str,
    /// Only children whose column holds one of these values are counted.
    pub when: Option<(&'static str, &'static [&'static str])>,
}

impl Tally {
    pub const fn all(field: &'static str) -> Self {
        Self { field, when: None }
    }

    pub const fn when(field: &'static str, column: &'static str, values: &'static [&'static str]) -> Self {
        Self { field, when: Some((column, values)) }
    }

    fn counts(&self, child: &Row) -> bool {
        match self.when {
            None => true,
            Some((column, values)) => row_str(child, column).is_some_and(|v| values.contains(&v)),
        }
    }
}

/// Children of `table` pointing at the parent through `foreign_key`.
#[derive(Debug, Clone, Copy)]
pub struct ChildCounts {
    pub table: Table,
    pub foreign_key: &'static str,
    pub tallies: &'static [Tally],
}

/// Parent -> intermediate -> child, summed per parent.
#[derive(Debug, Clone, Copy)]
pub struct TwoHopCount {
    pub via: Table,
    pub via_key: &'static str,
    pub table: Table,
    pub foreign_key: &'static str,
    pub field: &'static str,
}

fn key(raw: &str) -> String {
    raw.to_ascii_lowercase()
}

fn ids_of(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter_map(|r| row_str(r, column))
        .filter(|id| seen.insert(key(id)))
        .map(|id| Value::String(id.to_string()))
        .collect()
}

/// Foreign key plus every column a tally inspects, each once.
fn projection(counts: &ChildCounts) -> Vec<&'static str> {
    let mut columns = vec![counts.foreign_key];
    for column in counts.tallies.iter().filter_map(|t| t.when.map(|(c, _)| c)) {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}

/// Adds each tally of `counts` to every row, zero when a parent has no children.
pub async fn attach_child_counts(
    store: &dyn Store,
    rows: &mut [Row],
    counts: &ChildCounts,
) -> Result<(), StoreError> {
    let ids = ids_of(rows, "id");
    let mut grouped: HashMap<String, Vec<i64>> = HashMap::new();

    if !ids.is_empty() {
        let columns = projection(counts);

        let query = SelectQuery::table(counts.table)
            .columns(&columns)
            .is_in(counts.foreign_key, ids);

        for child in store.select(&query).await? {
            let Some(parent) = row_str(&child, counts.foreign_key) else {
                continue;
            };
            let slot = grouped.entry(key(parent)).or_insert_with(|| vec![0; counts.tallies.len()]);
            for (n, tally) in slot.iter_mut().zip(counts.tallies) {
                if tally.counts(&child) {
                    *n += 1;
                }
            }
        }
    }

    for row in rows.iter_mut() {
        let found = row_str(row, "id").and_then(|id| grouped.get(&key(id))).cloned();
        for (i, tally) in counts.tallies.iter().enumerate() {
            let n = found.as_ref().map_or(0, |f| f[i]);
            row.insert(tally.field.to_string(), Value::from(n));
        }
    }
    Ok(())
}

/// Counts grandchildren per parent by first collecting the intermediate ids.
pub async fn attach_two_hop_count(
    store: &dyn Store,
    rows: &mut [Row],
    hop: &TwoHopCount,
) -> Result<(), StoreError> {
    let ids = ids_of(rows, "id");
    let mut totals: HashMap<String, i64> = HashMap::new();

    if !ids.is_empty() {
        let via_rows = store
            .select(&SelectQuery::table(hop.via).columns(&["id", hop.via_key]).is_in(hop.via_key, ids))
            .await?;
        let parent_of: HashMap<String, String> = via_rows
            .iter()
            .filter_map(|r| Some((key(row_str(r, "id")?), key(row_str(r, hop.via_key)?))))
            .collect();

        let via_ids = ids_of(&via_rows, "id");
        if !via_ids.is_empty() {
            let children = store
                .select(&SelectQuery::table(hop.table).columns(&[hop.foreign_key]).is_in(hop.foreign_key, via_ids))
                .await?;
            for child in &children {
                if let Some(parent) = row_str(child, hop.foreign_key).and_then(|v| parent_of.get(&key(v))) {
                    *totals.entry(parent.clone()).or_default() += 1;
                }
            }
        }
    }

    for row in rows.iter_mut() {
        let n = row_str(row, "id").and_then(|id| totals.get(&key(id))).copied().unwrap_or(0);
        row.insert(hop.field.to_string(), Value::from(n));
    }
    Ok(())
}
