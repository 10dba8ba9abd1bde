use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use super::error::QueryError;
use super::types::{FilterDef, FilterKind, SearchDef};
use crate::api::QueryParams;
use crate::database::{Operand, Predicate};

pub struct FilterWhere;

impl FilterWhere {
    /// Predicates for every filter present in `params`. Absent parameters add nothing.
    pub fn predicates(
        filters: &[FilterDef],
        search: Option<&SearchDef>,
        params: &QueryParams,
    ) -> Result<Vec<Predicate>, QueryError> {
        let mut out = Vec::new();
        for def in filters {
            if let Some(operand) = Self::operand(def, params)? {
                out.push(Predicate::Where(def.column, operand));
            }
        }
        if let Some(search) = search {
            if let Some(term) = params.get(search.param) {
                out.push(Self::search(search, term));
            }
        }
        Ok(out)
    }

    fn operand(def: &FilterDef, params: &QueryParams) -> Result<Option<Operand>, QueryError> {
        match def.kind {
            FilterKind::Flag => Ok(flag(params.get(def.param)).map(|b| Operand::Eq(Value::Bool(b)))),
            FilterKind::Presence => Ok(flag(params.get(def.param))
                .map(|set| if set { Operand::NotNull } else { Operand::IsNull })),
            FilterKind::DateFrom => Ok(params
                .get(def.param)
                .map(|raw| parse_date(def.param, raw))
                .transpose()?
                .map(Operand::Gte)),
            FilterKind::DateTo => Ok(params
                .get(def.param)
                .map(|raw| parse_date(def.param, raw))
                .transpose()?
                .map(Operand::Lte)),
            kind => {
                let values = params
                    .values(def.param)
                    .into_iter()
                    .map(|raw| coerce(def.param, kind, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(membership(values))
            }
        }
    }

    fn search(search: &SearchDef, term: &str) -> Predicate {
        let mut matches: Vec<Predicate> = search
            .columns
            .iter()
            .map(|c| Predicate::Where(*c, Operand::Contains(term.to_string())))
            .collect();
        if matches.len() == 1 {
            matches.remove(0)
        } else {
            Predicate::AnyOf(matches)
        }
    }
}

/// Three-way flag: anything but `true`/`false` leaves the filter off.
fn flag(raw: Option<&str>) -> Option<bool> {
    match raw? {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn membership(mut values: Vec<Value>) -> Option<Operand> {
    match values.len() {
        0 => None,
        1 => values.pop().map(Operand::Eq),
        _ => Some(Operand::In(values)),
    }
}

fn coerce(param: &'static str, kind: FilterKind, raw: &str) -> Result<Value, QueryError> {
    match kind {
        FilterKind::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| QueryError::InvalidInteger { param, value: raw.to_string() }),
        FilterKind::Uuid => Uuid::parse_str(raw)
            .map(|id| Value::String(id.to_string()))
            .map_err(|_| QueryError::InvalidUuid { param, value: raw.to_string() }),
        FilterKind::Enum(allowed) => {
            if allowed.contains(&raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(QueryError::InvalidEnum {
                    param,
                    value: raw.to_string(),
                    expected: allowed.join(", "),
                })
            }
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_date(param: &'static str, raw: &str) -> Result<Value, QueryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .map_err(|_| QueryError::InvalidDate { param, value: raw.to_string() })
}
