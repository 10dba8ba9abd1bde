//! Turns a list endpoint's query string into a `SelectQuery`.

use super::error::QueryError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ListDef, ListQuery, PageLimits};
use crate::api::QueryParams;
use crate::database::SelectQuery;

/// Largest offset a SQL `OFFSET` (bigint) accepts.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Builds the windowed list query for `def` from request parameters.
///
/// The returned query carries the page window; `Store::count` ignores it, so
/// the same query also yields the total match count.
pub fn compose(def: &ListDef, params: &QueryParams, limits: PageLimits) -> Result<ListQuery, QueryError> {
    let mut query = SelectQuery::table(def.table).embeds(def.embeds);
    if let Some(columns) = def.columns {
        query = query.columns(columns);
    }

    query.predicates = FilterWhere::predicates(def.filters, def.search.as_ref(), params)?;
    query.order = FilterOrder::resolve(&def.sort, params)?;

    let page = page_number(params)?;
    let limit = page_size(params, limits)?;
    let offset = (page - 1).saturating_mul(limit).min(MAX_OFFSET);
    let query = query.window(offset, limit);

    if limits.debug_logging {
        tracing::debug!(
            table = %def.table,
            predicates = query.predicates.len(),
            page,
            limit,
            "composed list query"
        );
    }

    Ok(ListQuery { query, page, limit })
}

fn integer(params: &QueryParams, param: &'static str) -> Result<Option<i64>, QueryError> {
    params
        .get(param)
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| QueryError::InvalidInteger { param, value: raw.to_string() })
        })
        .transpose()
}

fn page_number(params: &QueryParams) -> Result<u64, QueryError> {
    Ok(integer(params, "page")?.map_or(1, |p| p.max(1) as u64))
}

fn page_size(params: &QueryParams, limits: PageLimits) -> Result<u64, QueryError> {
    let requested = match integer(params, "limit")? {
        Some(limit) => limit.max(1) as u64,
        None => limits.default_page_size,
    };
    if requested > limits.max_page_size {
        if limits.debug_logging {
            tracing::debug!("Limit {} exceeds max {}, capping to max", requested, limits.max_page_size);
        }
        return Ok(limits.max_page_size);
    }
    Ok(requested)
}
