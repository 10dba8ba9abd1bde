use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::resource::{display_name, embedded_str, object, parse_body, pick, reject_nulls, EntityDef};
use crate::aggregate::{attach_child_counts, attach_two_hop_count, ChildCounts, Tally, TwoHopCount};
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::auth::Role;
use crate::database::{row_str, ColumnRef, Embed, OrderBy, Row, SelectQuery, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SearchDef, SortDef, SortOption};
use crate::middleware::Caller;
use crate::types::{blank_as_none, CaseStatus, CaseType, ReferralSource, Tier};

const STUDENT_EMBED: Embed = Embed::left("student", Table::Students, "student_id", &["id", "name", "grade", "student_id"]);
const CASE_MANAGER: Embed = Embed::left(
    "case_manager",
    Table::Users,
    "case_manager_id",
    &["id", "email", "first_name", "last_name", "sss_position"],
);

pub static CASE: EntityDef = EntityDef {
    table: Table::Cases,
    label: "Case",
    detail_embeds: &[STUDENT_EMBED, CASE_MANAGER],
};

pub const CASE_LIST: ListDef = ListDef {
    table: Table::Cases,
    columns: Some(&[
        "id",
        "student_id",
        "case_type",
        "tier",
        "status",
        "is_urgent",
        "opened_date",
        "case_manager_id",
        "created_at",
        "updated_at",
    ]),
    embeds: &[
        STUDENT_EMBED.inner(),
        Embed::left("case_manager", Table::Users, "case_manager_id", &["id", "email", "first_name", "last_name"]),
    ],
    filters: &[
        FilterDef::base("status", FilterKind::Enum(CaseStatus::ALL)),
        FilterDef::base("case_type", FilterKind::Enum(CaseType::ALL)),
        FilterDef::base("tier", FilterKind::Int),
        FilterDef::base("is_urgent", FilterKind::Flag),
        FilterDef::base("case_manager_id", FilterKind::Uuid),
        FilterDef::base("student_id", FilterKind::Uuid),
        FilterDef::new("grade", ColumnRef::on("student", "grade"), FilterKind::Text),
    ],
    search: Some(SearchDef {
        param: "search",
        columns: &[ColumnRef::on("student", "name")],
    }),
    sort: SortDef {
        default_key: "is_urgent",
        default_descending: true,
        options: &[
            SortOption::new("is_urgent", ColumnRef::base("is_urgent"))
                .then(&[OrderBy::desc(ColumnRef::base("opened_date"))]),
            SortOption::new("student_name", ColumnRef::on("student", "name")),
            SortOption::new("opened_date", ColumnRef::base("opened_date")),
            SortOption::new("tier", ColumnRef::base("tier")),
            SortOption::new("status", ColumnRef::base("status")),
            SortOption::new("case_type", ColumnRef::base("case_type")),
            SortOption::new("created_at", ColumnRef::base("created_at")),
            SortOption::new("updated_at", ColumnRef::base("updated_at")),
        ],
    },
};

pub const INTERVENTION_COUNT: ChildCounts = ChildCounts {
    table: Table::Interventions,
    foreign_key: "case_id",
    tallies: &[Tally::all("intervention_count")],
};

const MEETING_COUNT: ChildCounts = ChildCounts {
    table: Table::ParentMeetings,
    foreign_key: "case_id",
    tallies: &[Tally::all("parent_meeting_count")],
};

const SESSION_COUNT: TwoHopCount = TwoHopCount {
    via: Table::Interventions,
    via_key: "case_id",
    table: Table::Sessions,
    foreign_key: "intervention_id",
    field: "session_count",
};

#[derive(Debug, Deserialize)]
struct NewCase {
    #[serde(default, deserialize_with = "blank_as_none")]
    student_id: Option<String>,
    case_type: Option<CaseType>,
    tier: Option<Tier>,
    status: Option<CaseStatus>,
    intervention_types: Option<Vec<String>>,
    is_urgent: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    opened_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    expected_closure_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    case_manager_id: Option<Uuid>,
    secondary_supporters: Option<Vec<Uuid>>,
    reason_for_referral: Option<String>,
    referral_source: Option<ReferralSource>,
    internal_notes: Option<String>,
}

/// Fields a PATCH may touch. Validation only; the request object itself is
/// applied so explicit nulls clear columns.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CasePatch {
    case_type: Option<CaseType>,
    tier: Option<Tier>,
    status: Option<CaseStatus>,
    intervention_types: Option<Vec<String>>,
    is_urgent: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    expected_closure_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    closed_date: Option<NaiveDate>,
    closure_reason: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    case_manager_id: Option<Uuid>,
    secondary_supporters: Option<Vec<Uuid>>,
    reason_for_referral: Option<String>,
    referral_source: Option<ReferralSource>,
    internal_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloseCase {
    closure_reason: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    closed_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct AssignManager {
    #[serde(default, deserialize_with = "blank_as_none")]
    case_manager_id: Option<String>,
}

pub struct CaseService<'a> {
    state: &'a AppState,
}

impl<'a> CaseService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_one(&self, caller: &Caller, body: &Row) -> Result<Row, ApiError> {
        let input: NewCase = parse_body(body)?;

        let (Some(student_id), Some(case_type)) = (input.student_id.as_deref(), input.case_type) else {
            return Err(ApiError::missing_fields(&["student_id", "case_type"]));
        };

        if input.status.is_some_and(|s| s != CaseStatus::Open) {
            return Err(ApiError::validation("New cases must be created with status OPEN"));
        }

        let student_id = entity_id(student_id, "Student")?;
        self.state.resource(&super::students::STUDENT).exists_404(student_id).await?;

        let row = object(json!({
            "student_id": student_id,
            "case_type": case_type,
            "tier": input.tier,
            "status": CaseStatus::Open,
            "intervention_types": input.intervention_types,
            "is_urgent": input.is_urgent.unwrap_or(false),
            "opened_date": input.opened_date.unwrap_or_else(|| self.state.clock.today()),
            "expected_closure_date": input.expected_closure_date,
            "case_manager_id": input.case_manager_id,
            "secondary_supporters": input.secondary_supporters,
            "reason_for_referral": input.reason_for_referral,
            "referral_source": input.referral_source,
            "internal_notes": input.internal_notes,
            "created_by": caller.id,
        }));

        self.state.resource(&CASE).create_one(row).await
    }

    /// Case with relations and intervention, session and meeting counts.
    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, CASE.label)?;
        let row = self.state.resource(&CASE).select_404(id).await?;

        let store = self.state.store.as_ref();
        let mut rows = [row];
        attach_child_counts(store, &mut rows, &INTERVENTION_COUNT).await?;
        attach_two_hop_count(store, &mut rows, &SESSION_COUNT).await?;
        attach_child_counts(store, &mut rows, &MEETING_COUNT).await?;
        let [row] = rows;
        Ok(row)
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (mut rows, count) = self
            .state
            .resource(&CASE)
            .list(&CASE_LIST, params, self.state.limits)
            .await?;
        attach_child_counts(self.state.store.as_ref(), &mut rows, &INTERVENTION_COUNT).await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    pub async fn update_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, CASE.label)?;
        let _: CasePatch = parse_body(body)?;
        reject_nulls(body, &["case_type", "status", "is_urgent"])?;
        self.state.resource(&CASE).update_404(id, body.clone()).await
    }

    /// Soft delete: moves the case to CLOSED with a reason.
    pub async fn close_404(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let input: CloseCase = parse_body(body)?;
        let reason = input
            .closure_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ApiError::validation("closure_reason is required"))?;

        let id = entity_id(raw_id, CASE.label)?;
        let cases = self.state.resource(&CASE);
        let existing = cases.exists_404(id).await?;
        if row_str(&existing, "status") == Some(CaseStatus::Closed.as_str()) {
            return Err(ApiError::conflict("Case is already closed"));
        }

        let patch = object(json!({
            "status": CaseStatus::Closed,
            "closed_date": input.closed_date.unwrap_or_else(|| self.state.clock.today()),
            "closure_reason": reason,
        }));
        cases.update_404(id, patch).await
    }

    pub async fn assign_manager(&self, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let input: AssignManager = parse_body(body)?;
        let Some(manager_id) = input.case_manager_id else {
            return Err(ApiError::missing_fields(&["case_manager_id"]));
        };

        let id = entity_id(raw_id, CASE.label)?;
        let cases = self.state.resource(&CASE);
        cases.exists_404(id).await?;

        let manager_id = entity_id(&manager_id, "Case manager")?;
        let manager = self
            .state
            .store
            .select_one(&SelectQuery::by_id(Table::Users, manager_id).columns(&["id", "role"]))
            .await?
            .ok_or_else(|| ApiError::not_found("Case manager"))?;
        if row_str(&manager, "role").and_then(Role::parse) != Some(Role::SssStaff) {
            return Err(ApiError::validation("Case manager must be SSS staff"));
        }

        cases
            .update_404(id, object(json!({ "case_manager_id": manager_id })))
            .await
    }

    /// Totals across every case.
    pub async fn statistics(&self) -> Result<CaseStatistics, ApiError> {
        let query = SelectQuery::table(Table::Cases).columns(&["status", "case_type", "tier", "is_urgent"]);
        let cases = self.state.store.select(&query).await?;

        let mut stats = CaseStatistics {
            total_cases: cases.len(),
            cases_by_type: CaseType::ALL.iter().map(|t| (*t, 0)).collect(),
            ..Default::default()
        };
        for case in &cases {
            match row_str(case, "status") {
                Some("OPEN") => stats.open_cases += 1,
                Some("ON_HOLD") => stats.on_hold_cases += 1,
                Some("CLOSED") => stats.closed_cases += 1,
                _ => {}
            }
            if case.get("is_urgent") == Some(&Value::Bool(true)) {
                stats.urgent_cases += 1;
            }
            match case.get("tier").and_then(Value::as_i64) {
                Some(1) => stats.tier_1_cases += 1,
                Some(2) => stats.tier_2_cases += 1,
                Some(3) => stats.tier_3_cases += 1,
                _ => {}
            }
            if let Some(n) = row_str(case, "case_type").and_then(|t| stats.cases_by_type.get_mut(t)) {
                *n += 1;
            }
        }
        Ok(stats)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CaseStatistics {
    pub total_cases: usize,
    pub open_cases: usize,
    pub on_hold_cases: usize,
    pub closed_cases: usize,
    pub urgent_cases: usize,
    pub tier_1_cases: usize,
    pub tier_2_cases: usize,
    pub tier_3_cases: usize,
    pub cases_by_type: BTreeMap<&'static str, usize>,
}

/// Flattened list row: student and manager names denormalised.
fn list_item(row: &Row) -> Row {
    let mut item = pick(
        row,
        &[
            "id",
            "student_id",
            "case_type",
            "tier",
            "status",
            "is_urgent",
            "opened_date",
            "case_manager_id",
            "intervention_count",
            "created_at",
            "updated_at",
        ],
    );
    item.insert("student_name".into(), embedded_str(row, "student", "name", "Unknown"));
    item.insert("student_grade".into(), embedded_str(row, "student", "grade", "Unknown"));
    item.insert(
        "case_manager_name".into(),
        display_name(row.get("case_manager")).map_or(Value::Null, Value::String),
    );
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_flattens_relations() {
        let row = object(json!({
            "id": "c1",
            "student_id": "s1",
            "case_type": "SEL",
            "tier": 2,
            "status": "OPEN",
            "is_urgent": true,
            "opened_date": "2025-03-01",
            "case_manager_id": null,
            "intervention_count": 3,
            "created_at": "t",
            "updated_at": "t",
            "student": { "id": "s1", "name": "Ana Ruiz", "grade": null },
            "case_manager": null,
        }));
        let item = list_item(&row);
        assert_eq!(item["student_name"], json!("Ana Ruiz"));
        assert_eq!(item["student_grade"], json!("Unknown"));
        assert_eq!(item["case_manager_name"], Value::Null);
        assert_eq!(item["intervention_count"], json!(3));
        assert!(item.get("student").is_none());
    }
}
