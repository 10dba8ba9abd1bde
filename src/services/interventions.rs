use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::cases::CASE;
use super::resource::{display_name, object, parse_body, pick, reject_nulls, EntityDef};
use crate::aggregate::{attach_child_counts, ChildCounts, Tally};
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::database::{row_str, ColumnRef, Embed, OrderBy, Row, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SortDef, SortOption};
use crate::types::{blank_as_none, InterventionType, Tier};

const FACILITATOR: Embed = Embed::left(
    "facilitator",
    Table::Users,
    "facilitator_id",
    &["id", "email", "first_name", "last_name", "sss_position"],
);

pub static INTERVENTION: EntityDef = EntityDef {
    table: Table::Interventions,
    label: "Intervention",
    detail_embeds: &[FACILITATOR],
};

pub const INTERVENTION_LIST: ListDef = ListDef {
    table: Table::Interventions,
    columns: Some(&[
        "id",
        "case_id",
        "type",
        "tier",
        "intervention_name",
        "start_date",
        "estimated_end_date",
        "actual_end_date",
        "facilitator_id",
        "is_active",
        "created_at",
        "updated_at",
    ]),
    embeds: &[Embed::left("facilitator", Table::Users, "facilitator_id", &["id", "email", "first_name", "last_name"])],
    filters: &[
        FilterDef::base("case_id", FilterKind::Uuid),
        FilterDef::base("type", FilterKind::Enum(InterventionType::ALL)),
        FilterDef::base("tier", FilterKind::Int),
        FilterDef::base("is_active", FilterKind::Flag),
        FilterDef::base("facilitator_id", FilterKind::Uuid),
    ],
    search: None,
    sort: SortDef {
        default_key: "is_active",
        default_descending: true,
        options: &[
            SortOption::new("is_active", ColumnRef::base("is_active"))
                .then(&[OrderBy::desc(ColumnRef::base("start_date"))]),
            SortOption::new("start_date", ColumnRef::base("start_date")),
            SortOption::new("intervention_name", ColumnRef::base("intervention_name")),
            SortOption::new("tier", ColumnRef::base("tier")),
            SortOption::new("created_at", ColumnRef::base("created_at")),
        ],
    },
};

pub const SESSION_COUNT: ChildCounts = ChildCounts {
    table: Table::Sessions,
    foreign_key: "intervention_id",
    tallies: &[Tally::all("session_count")],
};

#[derive(Debug, Deserialize)]
struct NewIntervention {
    #[serde(default, deserialize_with = "blank_as_none")]
    case_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<InterventionType>,
    tier: Option<Tier>,
    #[serde(default, deserialize_with = "blank_as_none")]
    intervention_name: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    estimated_end_date: Option<NaiveDate>,
    duration_weeks: Option<i32>,
    frequency: Option<String>,
    delivery_format: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    facilitator_id: Option<Uuid>,
    location: Option<String>,
    is_escalatable_tier: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    escalated_from_intervention_id: Option<Uuid>,
}

/// Validation only; see `CasePatch`.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InterventionPatch {
    #[serde(rename = "type")]
    kind: Option<InterventionType>,
    tier: Option<Tier>,
    intervention_name: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    estimated_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    actual_end_date: Option<NaiveDate>,
    duration_weeks: Option<i32>,
    frequency: Option<String>,
    delivery_format: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    facilitator_id: Option<Uuid>,
    location: Option<String>,
    is_active: Option<bool>,
    reason_for_ending: Option<String>,
    is_escalatable_tier: Option<bool>,
}

pub struct InterventionService<'a> {
    state: &'a AppState,
}

impl<'a> InterventionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_one(&self, body: &Row) -> Result<Row, ApiError> {
        let input: NewIntervention = parse_body(body)?;
        let (Some(case_id), Some(kind), Some(name), Some(start_date)) =
            (input.case_id.as_deref(), input.kind, input.intervention_name, input.start_date)
        else {
            return Err(ApiError::missing_fields(&["case_id", "type", "intervention_name", "start_date"]));
        };

        let case_id = entity_id(case_id, CASE.label)?;
        self.state.resource(&CASE).exists_404(case_id).await?;

        let row = object(json!({
            "case_id": case_id,
            "type": kind,
            "tier": input.tier,
            "intervention_name": name,
            "description": input.description,
            "start_date": start_date,
            "estimated_end_date": input.estimated_end_date,
            "duration_weeks": input.duration_weeks,
            "frequency": input.frequency,
            "delivery_format": input.delivery_format,
            "facilitator_id": input.facilitator_id,
            "location": input.location,
            "is_active": true,
            "is_escalatable_tier": input.is_escalatable_tier.unwrap_or(true),
            "escalated_from_intervention_id": input.escalated_from_intervention_id,
        }));
        self.state.resource(&INTERVENTION).create_one(row).await
    }

    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, INTERVENTION.label)?;
        let row = self.state.resource(&INTERVENTION).select_404(id).await?;
        let mut rows = [row];
        attach_child_counts(self.state.store.as_ref(), &mut rows, &SESSION_COUNT).await?;
        let [row] = rows;
        Ok(row)
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (mut rows, count) = self
            .state
            .resource(&INTERVENTION)
            .list(&INTERVENTION_LIST, params, self.state.limits)
            .await?;
        attach_child_counts(self.state.store.as_ref(), &mut rows, &SESSION_COUNT).await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    pub async fn update_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, INTERVENTION.label)?;
        let _: InterventionPatch = parse_body(body)?;
        reject_nulls(body, &["type", "intervention_name", "start_date", "is_active", "is_escalatable_tier"])?;
        self.state.resource(&INTERVENTION).update_404(id, body.clone()).await
    }

    /// Hard delete. Sessions go with it.
    pub async fn delete_404(&self, raw_id: &str) -> Result<Value, ApiError> {
        let id = entity_id(raw_id, INTERVENTION.label)?;
        let removed = self.state.resource(&INTERVENTION).delete_404(id).await?;
        Ok(json!({ "id": row_str(&removed, "id").unwrap_or_default() }))
    }
}

fn list_item(row: &Row) -> Row {
    let mut item = pick(
        row,
        &[
            "id",
            "case_id",
            "type",
            "tier",
            "intervention_name",
            "start_date",
            "estimated_end_date",
            "actual_end_date",
            "facilitator_id",
            "is_active",
            "session_count",
            "created_at",
            "updated_at",
        ],
    );
    item.insert(
        "facilitator_name".into(),
        display_name(row.get("facilitator")).map_or(Value::Null, Value::String),
    );
    item
}
