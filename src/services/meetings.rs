use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::cases::CASE;
use super::resource::{display_name, embedded_str, object, parse_body, pick, reject_nulls, EntityDef};
use super::students::STUDENT;
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::database::{ColumnRef, Embed, Row, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SortDef, SortOption};
use crate::types::{blank_as_none, MeetingStatus};

const STUDENT_EMBED: Embed = Embed::left("student", Table::Students, "student_id", &["id", "name", "grade", "student_id"]);
const CASE_EMBED: Embed = Embed::left("case", Table::Cases, "case_id", &["id", "case_type", "status", "tier"]);
const SSS_STAFF: Embed = Embed::left(
    "sss_staff",
    Table::Users,
    "sss_staff_id",
    &["id", "email", "first_name", "last_name", "sss_position"],
);

pub static MEETING: EntityDef = EntityDef {
    table: Table::ParentMeetings,
    label: "Meeting",
    detail_embeds: &[STUDENT_EMBED, CASE_EMBED, SSS_STAFF],
};

const LIST_COLUMNS: &[&str] = &[
    "id",
    "student_id",
    "case_id",
    "meeting_date",
    "meeting_time",
    "sss_staff_id",
    "is_scheduled",
    "meeting_status",
    "agenda",
    "next_meeting_date",
    "created_at",
    "updated_at",
];

pub const MEETING_LIST: ListDef = ListDef {
    table: Table::ParentMeetings,
    columns: Some(LIST_COLUMNS),
    embeds: &[STUDENT_EMBED, SSS_STAFF],
    filters: &[
        FilterDef::base("student_id", FilterKind::Uuid),
        FilterDef::base("case_id", FilterKind::Uuid),
        FilterDef::base("sss_staff_id", FilterKind::Uuid),
        FilterDef::base("meeting_status", FilterKind::Enum(MeetingStatus::ALL)),
        FilterDef::base("is_scheduled", FilterKind::Flag),
        FilterDef::new("meeting_date_from", ColumnRef::base("meeting_date"), FilterKind::DateFrom),
        FilterDef::new("meeting_date_to", ColumnRef::base("meeting_date"), FilterKind::DateTo),
    ],
    search: None,
    sort: SortDef {
        default_key: "meeting_date",
        default_descending: false,
        options: &[
            SortOption::new("meeting_date", ColumnRef::base("meeting_date")),
            SortOption::new("meeting_status", ColumnRef::base("meeting_status")),
            SortOption::new("created_at", ColumnRef::base("created_at")),
        ],
    },
};

#[derive(Debug, Deserialize)]
struct NewMeeting {
    #[serde(default, deserialize_with = "blank_as_none")]
    student_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    case_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    meeting_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    meeting_time: Option<NaiveTime>,
    parent_ids: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    sss_staff_id: Option<Uuid>,
    teacher_ids: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    admin_id: Option<Uuid>,
    is_scheduled: Option<bool>,
    meeting_status: Option<MeetingStatus>,
    agenda: Option<String>,
    agenda_link: Option<String>,
    frequency: Option<String>,
}

/// Validation only; see `CasePatch`.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MeetingPatch {
    #[serde(default, deserialize_with = "blank_as_none")]
    meeting_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    meeting_time: Option<NaiveTime>,
    parent_ids: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    sss_staff_id: Option<Uuid>,
    teacher_ids: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    admin_id: Option<Uuid>,
    is_scheduled: Option<bool>,
    meeting_status: Option<MeetingStatus>,
    cancellation_reason: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    rescheduled_date: Option<NaiveDate>,
    agenda: Option<String>,
    agenda_link: Option<String>,
    meeting_notes: Option<String>,
    next_steps: Option<String>,
    action_plan: Option<Value>,
    #[serde(default, deserialize_with = "blank_as_none")]
    next_meeting_date: Option<NaiveDate>,
    reminder_sent: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    reminder_sent_date: Option<NaiveDate>,
    frequency: Option<String>,
}

pub struct MeetingService<'a> {
    state: &'a AppState,
}

impl<'a> MeetingService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_one(&self, body: &Row) -> Result<Row, ApiError> {
        let input: NewMeeting = parse_body(body)?;
        let Some(student_id) = input.student_id.as_deref() else {
            return Err(ApiError::missing_fields(&["student_id"]));
        };

        let student_id = entity_id(student_id, STUDENT.label)?;
        self.state.resource(&STUDENT).exists_404(student_id).await?;

        let case_id = match input.case_id.as_deref() {
            Some(raw) => {
                let id = entity_id(raw, CASE.label)?;
                self.state.resource(&CASE).exists_404(id).await?;
                Some(id)
            }
            None => None,
        };

        let row = object(json!({
            "student_id": student_id,
            "case_id": case_id,
            "meeting_date": input.meeting_date,
            "meeting_time": input.meeting_time.map(|t| t.format("%H:%M:%S").to_string()),
            "parent_ids": input.parent_ids,
            "sss_staff_id": input.sss_staff_id,
            "teacher_ids": input.teacher_ids,
            "admin_id": input.admin_id,
            "is_scheduled": input.is_scheduled.unwrap_or(input.meeting_date.is_some()),
            "meeting_status": input.meeting_status.unwrap_or(MeetingStatus::Scheduled),
            "agenda": input.agenda,
            "agenda_link": input.agenda_link,
            "frequency": input.frequency,
            "reminder_sent": false,
        }));
        self.state.resource(&MEETING).create_one(row).await
    }

    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, MEETING.label)?;
        self.state.resource(&MEETING).select_404(id).await
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (rows, count) = self
            .state
            .resource(&MEETING)
            .list(&MEETING_LIST, params, self.state.limits)
            .await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    pub async fn update_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, MEETING.label)?;
        let _: MeetingPatch = parse_body(body)?;
        reject_nulls(body, &["meeting_status", "is_scheduled", "reminder_sent"])?;
        self.state.resource(&MEETING).update_404(id, body.clone()).await
    }
}

fn list_item(row: &Row) -> Row {
    let mut item = pick(row, LIST_COLUMNS);
    item.insert("student_name".into(), embedded_str(row, "student", "name", "Unknown"));
    item.insert("student_grade".into(), embedded_str(row, "student", "grade", "Unknown"));
    item.insert(
        "sss_staff_name".into(),
        display_name(row.get("sss_staff")).map_or(Value::Null, Value::String),
    );
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_names_staff_by_email_when_unnamed() {
        let row = object(json!({
            "id": "m1",
            "student_id": "s1",
            "meeting_date": null,
            "meeting_status": "SCHEDULED",
            "student": { "name": "Ben Okafor", "grade": "G7" },
            "sss_staff": { "first_name": null, "last_name": null, "email": "staff@school.test" },
        }));
        let item = list_item(&row);
        assert_eq!(item["student_name"], json!("Ben Okafor"));
        assert_eq!(item["sss_staff_name"], json!("staff@school.test"));
        assert_eq!(item["meeting_date"], Value::Null);
        assert!(item.get("sss_staff").is_none());
    }
}
