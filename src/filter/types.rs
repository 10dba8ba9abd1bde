use crate::config::QueryConfig;
use crate::database::{ColumnRef, Embed, OrderBy, SelectQuery, Table};

/// How a query-string value is coerced before it becomes a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Plain text, equality or membership.
    Text,
    Uuid,
    /// Must be one of the listed values.
    Enum(&'static [&'static str]),
    /// Integer column such as `tier`.
    Int,
    /// Boolean column. Only `true` and `false` constrain.
    Flag,
    /// `true` means the column is set, `false` that it is null.
    Presence,
    /// Inclusive lower bound on a date column.
    DateFrom,
    /// Inclusive upper bound on a date column.
    DateTo,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterDef {
    pub param: &'static str,
    pub column: ColumnRef,
    pub kind: FilterKind,
}

impl FilterDef {
    pub const fn new(param: &'static str, column: ColumnRef, kind: FilterKind) -> Self {
        Self { param, column, kind }
    }

    /// Filter whose parameter name matches a column on the listed table.
    pub const fn base(param: &'static str, kind: FilterKind) -> Self {
        Self::new(param, ColumnRef::base(param), kind)
    }
}

/// Free-text parameter matched case-insensitively against any of `columns`.
#[derive(Debug, Clone, Copy)]
pub struct SearchDef {
    pub param: &'static str,
    pub columns: &'static [ColumnRef],
}

/// A `sort_by` key. The requested direction applies to `column`; `then`
/// follows unchanged.
#[derive(Debug, Clone, Copy)]
pub struct SortOption {
    pub key: &'static str,
    pub column: ColumnRef,
    pub then: &'static [OrderBy],
}

impl SortOption {
    pub const fn new(key: &'static str, column: ColumnRef) -> Self {
        Self { key, column, then: &[] }
    }

    pub const fn then(self, then: &'static [OrderBy]) -> Self {
        Self { then, ..self }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SortDef {
    pub default_key: &'static str,
    pub default_descending: bool,
    pub options: &'static [SortOption],
}

/// Everything the composer needs to know about one list endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ListDef {
    pub table: Table,
    pub columns: Option<&'static [&'static str]>,
    pub embeds: &'static [Embed],
    pub filters: &'static [FilterDef],
    pub search: Option<SearchDef>,
    pub sort: SortDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
    /// Emit debug events for composed queries and page-size capping.
    pub debug_logging: bool,
}

impl PageLimits {
    pub fn from_config(query: &QueryConfig) -> Self {
        Self {
            default_page_size: u64::from(query.default_page_size.max(1)),
            max_page_size: u64::from(query.max_page_size.max(1)),
            debug_logging: query.debug_logging,
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_page_size: 50, max_page_size: 1000, debug_logging: false }
    }
}

/// A composed list read: the windowed query plus the page it represents.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub query: SelectQuery,
    pub page: u64,
    pub limit: u64,
}
