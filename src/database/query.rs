//! Store-neutral description of a read against one table.
//!
//! A `SelectQuery` is what the query composer produces and what every
//! `Store` backend consumes. It only names columns from the static schema,
//! and `validate` rejects anything else before a backend sees it.

use serde_json::Value;
use uuid::Uuid;

use super::error::StoreError;
use super::schema::Table;

/// A column on the queried table (`relation == None`) or on one of its embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub relation: Option<&'static str>,
    pub column: &'static str,
}

impl ColumnRef {
    pub const fn base(column: &'static str) -> Self {
        Self { relation: None, column }
    }

    pub const fn on(relation: &'static str, column: &'static str) -> Self {
        Self { relation: Some(relation), column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Eq(Value),
    In(Vec<Value>),
    Gte(Value),
    Lte(Value),
    IsNull,
    NotNull,
    /// Case-insensitive substring match.
    Contains(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Where(ColumnRef, Operand),
    AnyOf(Vec<Predicate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Rows without a match are dropped.
    Inner,
    /// Rows without a match carry `null` under the alias.
    Left,
}

/// Many-to-one join rendered as a nested object under `alias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embed {
    pub alias: &'static str,
    pub table: Table,
    pub foreign_key: &'static str,
    pub columns: &'static [&'static str],
    pub join: JoinKind,
}

impl Embed {
    pub const fn left(
        alias: &'static str,
        table: Table,
        foreign_key: &'static str,
        columns: &'static [&'static str],
    ) -> Self {
        Self { alias, table, foreign_key, columns, join: JoinKind::Left }
    }

    pub const fn inner(self) -> Self {
        Self { join: JoinKind::Inner, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
    pub nulls_first: bool,
}

impl OrderBy {
    /// Nulls follow PostgreSQL's default placement for the direction.
    pub const fn new(column: ColumnRef, descending: bool) -> Self {
        Self { column, descending, nulls_first: descending }
    }

    pub const fn asc(column: ColumnRef) -> Self {
        Self::new(column, false)
    }

    pub const fn desc(column: ColumnRef) -> Self {
        Self::new(column, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: Table,
    pub columns: Option<Vec<&'static str>>,
    pub embeds: Vec<Embed>,
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderBy>,
    pub window: Option<Window>,
}

impl SelectQuery {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            columns: None,
            embeds: vec![],
            predicates: vec![],
            order: vec![],
            window: None,
        }
    }

    pub fn by_id(table: Table, id: Uuid) -> Self {
        Self::table(table).eq("id", id.to_string())
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = Some(columns.to_vec());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn embeds(mut self, embeds: &[Embed]) -> Self {
        self.embeds.extend_from_slice(embeds);
        self
    }

    pub fn filter(mut self, column: ColumnRef, operand: Operand) -> Self {
        self.predicates.push(Predicate::Where(column, operand));
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(ColumnRef::base(column), Operand::Eq(value.into()))
    }

    pub fn is_in(self, column: &'static str, values: Vec<Value>) -> Self {
        self.filter(ColumnRef::base(column), Operand::In(values))
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some(Window { offset, limit });
        self
    }

    pub fn embed_for(&self, alias: &str) -> Option<&Embed> {
        self.embeds.iter().find(|e| e.alias == alias)
    }

    /// Table a column reference resolves to, if the reference is known.
    pub fn resolve(&self, column: &ColumnRef) -> Option<Table> {
        match column.relation {
            None => Some(self.table),
            Some(alias) => self.embed_for(alias).map(|e| e.table),
        }
    }

    /// Checks every referenced column and alias against the schema.
    pub fn validate(&self) -> Result<(), StoreError> {
        let schema = self.table.schema();
        if let Some(columns) = &self.columns {
            for c in columns {
                if !schema.has_column(c) {
                    return Err(unknown_column(self.table, c));
                }
            }
        }
        for (i, embed) in self.embeds.iter().enumerate() {
            if self.embeds[..i].iter().any(|e| e.alias == embed.alias) || schema.has_column(embed.alias) {
                return Err(StoreError::InvalidQuery(format!("Duplicate embed alias: {}", embed.alias)));
            }
            if !schema.has_column(embed.foreign_key) {
                return Err(unknown_column(self.table, embed.foreign_key));
            }
            let target = embed.table.schema();
            for c in embed.columns {
                if !target.has_column(c) {
                    return Err(unknown_column(embed.table, c));
                }
            }
        }
        for predicate in &self.predicates {
            self.validate_predicate(predicate)?;
        }
        for order in &self.order {
            self.validate_column(&order.column)?;
        }
        Ok(())
    }

    fn validate_predicate(&self, predicate: &Predicate) -> Result<(), StoreError> {
        match predicate {
            Predicate::Where(column, _) => self.validate_column(column),
            Predicate::AnyOf(inner) => inner.iter().try_for_each(|p| self.validate_predicate(p)),
        }
    }

    fn validate_column(&self, column: &ColumnRef) -> Result<(), StoreError> {
        let table = self.resolve(column).ok_or_else(|| {
            StoreError::InvalidQuery(format!("Unknown relation: {}", column.relation.unwrap_or_default()))
        })?;
        if table.schema().has_column(column.column) {
            Ok(())
        } else {
            Err(unknown_column(table, column.column))
        }
    }
}

fn unknown_column(table: Table, column: &str) -> StoreError {
    StoreError::InvalidQuery(format!("Unknown column {}.{}", table, column))
}
