use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::resource::{display_name, object, parse_body, pick, reject_nulls, EntityDef};
use crate::aggregate::{attach_child_counts, ChildCounts, Tally};
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::database::{ColumnRef, Embed, OrderBy, Row, SelectQuery, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SearchDef, SortDef, SortOption};
use crate::types::{blank_as_none, CaseStatus};

const PRIMARY_TEACHER: Embed = Embed::left(
    "primary_teacher",
    Table::Users,
    "primary_teacher_id",
    &["id", "email", "first_name", "last_name"],
);

pub static STUDENT: EntityDef = EntityDef {
    table: Table::Students,
    label: "Student",
    detail_embeds: &[PRIMARY_TEACHER],
};

pub const STUDENT_LIST: ListDef = ListDef {
    table: Table::Students,
    columns: Some(&[
        "id",
        "name",
        "grade",
        "student_id",
        "primary_teacher_id",
        "created_at",
        "updated_at",
        "archived_at",
    ]),
    embeds: &[PRIMARY_TEACHER],
    filters: &[
        FilterDef::base("grade", FilterKind::Text),
        FilterDef::base("primary_teacher_id", FilterKind::Uuid),
        FilterDef::base("school_id", FilterKind::Uuid),
        FilterDef::new("archived", ColumnRef::base("archived_at"), FilterKind::Presence),
    ],
    search: Some(SearchDef {
        param: "search",
        columns: &[ColumnRef::base("name"), ColumnRef::base("student_id")],
    }),
    sort: SortDef {
        default_key: "name",
        default_descending: false,
        options: &[
            SortOption::new("name", ColumnRef::base("name")),
            SortOption::new("grade", ColumnRef::base("grade")).then(&[OrderBy::asc(ColumnRef::base("name"))]),
            SortOption::new("created_at", ColumnRef::base("created_at")),
        ],
    },
};

const CASE_COUNTS: ChildCounts = ChildCounts {
    table: Table::Cases,
    foreign_key: "student_id",
    tallies: &[
        Tally::all("case_count"),
        Tally::when("active_case_count", "status", CaseStatus::ACTIVE),
    ],
};

const CASE_MANAGER: Embed = Embed::left(
    "case_manager",
    Table::Users,
    "case_manager_id",
    &["id", "email", "first_name", "last_name", "sss_position"],
);

#[derive(Debug, Deserialize)]
struct NewStudent {
    #[serde(default, deserialize_with = "blank_as_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    grade: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    student_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    nationality: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    mother_tongue: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    start_date_at_atlas: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    previous_school: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    primary_teacher_id: Option<Uuid>,
    #[serde(default, deserialize_with = "blank_as_none")]
    school_id: Option<Uuid>,
}

/// Validation only; see `CasePatch`.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StudentPatch {
    name: Option<String>,
    grade: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    date_of_birth: Option<NaiveDate>,
    student_id: Option<String>,
    nationality: Option<String>,
    mother_tongue: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    start_date_at_atlas: Option<NaiveDate>,
    previous_school: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    primary_teacher_id: Option<Uuid>,
    #[serde(default, deserialize_with = "blank_as_none")]
    school_id: Option<Uuid>,
    #[serde(default, deserialize_with = "blank_as_none")]
    archived_at: Option<DateTime<Utc>>,
}

pub struct StudentService<'a> {
    state: &'a AppState,
}

impl<'a> StudentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_one(&self, body: &Row) -> Result<Row, ApiError> {
        let input: NewStudent = parse_body(body)?;
        let (Some(name), Some(grade)) = (input.name, input.grade) else {
            return Err(ApiError::missing_fields(&["name", "grade"]));
        };

        let row = object(json!({
            "name": name,
            "grade": grade,
            "date_of_birth": input.date_of_birth,
            "student_id": input.student_id,
            "nationality": input.nationality,
            "mother_tongue": input.mother_tongue,
            "start_date_at_atlas": input.start_date_at_atlas,
            "previous_school": input.previous_school,
            "primary_teacher_id": input.primary_teacher_id,
            "school_id": input.school_id,
        }));
        self.state.resource(&STUDENT).create_one(row).await
    }

    /// Student with primary teacher, every case (newest first) and case counts.
    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, STUDENT.label)?;
        let mut student = self.state.resource(&STUDENT).select_404(id).await?;

        let query = SelectQuery::table(Table::Cases)
            .embed(CASE_MANAGER)
            .eq("student_id", id.to_string())
            .order_by(OrderBy::desc(ColumnRef::base("created_at")))
            .order_by(OrderBy::asc(ColumnRef::base("id")));
        let cases = self.state.store.select(&query).await?;

        let active = cases
            .iter()
            .filter(|c| {
                c.get("status")
                    .and_then(Value::as_str)
                    .is_some_and(|s| CaseStatus::ACTIVE.contains(&s))
            })
            .count();
        student.insert("case_count".into(), json!(cases.len()));
        student.insert("active_case_count".into(), json!(active));
        student.insert("cases".into(), Value::Array(cases.into_iter().map(Value::Object).collect()));
        Ok(student)
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (mut rows, count) = self
            .state
            .resource(&STUDENT)
            .list(&STUDENT_LIST, params, self.state.limits)
            .await?;
        attach_child_counts(self.state.store.as_ref(), &mut rows, &CASE_COUNTS).await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    pub async fn update_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, STUDENT.label)?;
        let _: StudentPatch = parse_body(body)?;
        reject_nulls(body, &["name", "grade"])?;
        self.state.resource(&STUDENT).update_404(id, body.clone()).await
    }
}

fn list_item(row: &Row) -> Row {
    let mut item = pick(
        row,
        &[
            "id",
            "name",
            "grade",
            "student_id",
            "primary_teacher_id",
            "case_count",
            "active_case_count",
            "created_at",
            "updated_at",
            "archived_at",
        ],
    );
    item.insert(
        "primary_teacher_name".into(),
        display_name(row.get("primary_teacher")).map_or(Value::Null, Value::String),
    );
    item
}
