use super::error::QueryError;
use super::types::{SortDef, SortOption};
use crate::api::QueryParams;
use crate::database::{ColumnRef, OrderBy};

/// Final tiebreak so equal sort keys page deterministically.
pub const ID_TIEBREAK: OrderBy = OrderBy::asc(ColumnRef::base("id"));

pub struct FilterOrder;

impl FilterOrder {
    /// Ordering for `sort_by`/`sort_direction`, falling back to the list's default.
    pub fn resolve(sort: &SortDef, params: &QueryParams) -> Result<Vec<OrderBy>, QueryError> {
        let key = params.get("sort_by").unwrap_or(sort.default_key);
        let option = Self::option(sort, key)?;
        let descending = match params.get("sort_direction") {
            Some(direction) => direction != "asc",
            None => sort.default_descending,
        };

        let mut order = vec![OrderBy::new(option.column, descending)];
        order.extend_from_slice(option.then);
        if option.column != ID_TIEBREAK.column {
            order.push(ID_TIEBREAK);
        }
        Ok(order)
    }

    fn option<'d>(sort: &'d SortDef, key: &str) -> Result<&'d SortOption, QueryError> {
        sort.options.iter().find(|o| o.key == key).ok_or_else(|| QueryError::InvalidSort {
            value: key.to_string(),
            expected: sort.options.iter().map(|o| o.key).collect::<Vec<_>>().join(", "),
        })
    }
}
