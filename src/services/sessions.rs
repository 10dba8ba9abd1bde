use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::interventions::INTERVENTION;
use super::resource::{display_name, object, parse_body, pick, reject_nulls, EntityDef};
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::database::{ColumnRef, Embed, Row, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SortDef, SortOption};
use crate::types::blank_as_none;

const FACILITATOR: Embed = Embed::left(
    "facilitator",
    Table::Users,
    "facilitator_id",
    &["id", "email", "first_name", "last_name"],
);
const INTERVENTION_EMBED: Embed = Embed::left(
    "intervention",
    Table::Interventions,
    "intervention_id",
    &["id", "case_id", "intervention_name", "type", "tier"],
);

pub static SESSION: EntityDef = EntityDef {
    table: Table::Sessions,
    label: "Session",
    detail_embeds: &[INTERVENTION_EMBED, FACILITATOR],
};

const LIST_COLUMNS: &[&str] = &[
    "id",
    "intervention_id",
    "session_date",
    "session_time",
    "duration",
    "facilitator_id",
    "student_attended",
    "student_progress",
    "created_at",
    "updated_at",
];

pub const SESSION_LIST: ListDef = ListDef {
    table: Table::Sessions,
    columns: Some(LIST_COLUMNS),
    embeds: &[FACILITATOR],
    filters: &[
        FilterDef::base("intervention_id", FilterKind::Uuid),
        FilterDef::base("facilitator_id", FilterKind::Uuid),
        FilterDef::base("student_attended", FilterKind::Flag),
        FilterDef::new("session_date_from", ColumnRef::base("session_date"), FilterKind::DateFrom),
        FilterDef::new("session_date_to", ColumnRef::base("session_date"), FilterKind::DateTo),
    ],
    search: None,
    sort: SortDef {
        default_key: "session_date",
        default_descending: true,
        options: &[
            SortOption::new("session_date", ColumnRef::base("session_date")),
            SortOption::new("created_at", ColumnRef::base("created_at")),
        ],
    },
};

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(default, deserialize_with = "blank_as_none")]
    intervention_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    session_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    session_time: Option<NaiveTime>,
    duration: Option<i32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    facilitator_id: Option<Uuid>,
    student_attended: Option<bool>,
    student_notes: Option<String>,
    observation_notes: Option<String>,
    student_progress: Option<String>,
    challenges: Option<String>,
    teacher_feedback: Option<String>,
}

/// Validation only; see `CasePatch`.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionPatch {
    #[serde(default, deserialize_with = "blank_as_none")]
    session_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    session_time: Option<NaiveTime>,
    duration: Option<i32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    facilitator_id: Option<Uuid>,
    student_attended: Option<bool>,
    student_notes: Option<String>,
    observation_notes: Option<String>,
    student_progress: Option<String>,
    challenges: Option<String>,
    teacher_feedback: Option<String>,
}

pub struct SessionService<'a> {
    state: &'a AppState,
}

impl<'a> SessionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_one(&self, body: &Row) -> Result<Row, ApiError> {
        let input: NewSession = parse_body(body)?;
        let (Some(intervention_id), Some(session_date)) = (input.intervention_id.as_deref(), input.session_date) else {
            return Err(ApiError::missing_fields(&["intervention_id", "session_date"]));
        };

        let intervention_id = entity_id(intervention_id, INTERVENTION.label)?;
        self.state.resource(&INTERVENTION).exists_404(intervention_id).await?;

        let row = object(json!({
            "intervention_id": intervention_id,
            "session_date": session_date,
            "session_time": input.session_time.map(|t| t.format("%H:%M:%S").to_string()),
            "duration": input.duration,
            "facilitator_id": input.facilitator_id,
            "student_attended": input.student_attended.unwrap_or(true),
            "student_notes": input.student_notes,
            "observation_notes": input.observation_notes,
            "student_progress": input.student_progress,
            "challenges": input.challenges,
            "teacher_feedback": input.teacher_feedback,
        }));
        self.state.resource(&SESSION).create_one(row).await
    }

    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, SESSION.label)?;
        self.state.resource(&SESSION).select_404(id).await
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (rows, count) = self
            .state
            .resource(&SESSION)
            .list(&SESSION_LIST, params, self.state.limits)
            .await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    pub async fn update_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, SESSION.label)?;
        let _: SessionPatch = parse_body(body)?;
        reject_nulls(body, &["session_date", "student_attended"])?;
        self.state.resource(&SESSION).update_404(id, body.clone()).await
    }
}

fn list_item(row: &Row) -> Row {
    let mut item = pick(row, LIST_COLUMNS);
    item.insert(
        "facilitator_name".into(),
        display_name(row.get("facilitator")).map_or(Value::Null, Value::String),
    );
    item
}
