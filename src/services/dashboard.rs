//! Staff dashboard figures. Every number is computed from store reads at
//! request time; nothing is cached.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

use super::cases::INTERVENTION_COUNT;
use super::resource::{display_name, embedded_str, pick};
use crate::aggregate::attach_child_counts;
use crate::app::AppState;
use crate::database::{row_str, ColumnRef, Embed, Operand, OrderBy, Row, SelectQuery, Table};
use crate::error::ApiError;
use crate::filter::ID_TIEBREAK;
use crate::middleware::Caller;
use crate::types::{CaseStatus, MeetingStatus};

const STUDENT_EMBED: Embed = Embed::left("student", Table::Students, "student_id", &["id", "name", "grade"]);
const CASE_MANAGER: Embed = Embed::left("case_manager", Table::Users, "case_manager_id", &["id", "email", "first_name", "last_name"]);

/// Days ahead counted as upcoming, today included.
const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_cases: i64,
    pub urgent_cases: i64,
    pub active_interventions: i64,
    pub upcoming_meetings: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct CaseLoad {
    pub total: usize,
    pub open: usize,
    pub on_hold: usize,
    pub tier_1: usize,
    pub tier_2: usize,
    pub tier_3: usize,
    pub urgent: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct GradeTiers {
    pub grade: String,
    pub tier_1: usize,
    pub tier_2: usize,
    pub tier_3: usize,
    pub total: usize,
}

fn active_cases() -> SelectQuery {
    SelectQuery::table(Table::Cases).is_in("status", strings(CaseStatus::ACTIVE))
}

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn is_active(row: &Row) -> bool {
    row_str(row, "status").is_some_and(|s| CaseStatus::ACTIVE.contains(&s))
}

pub struct DashboardService<'a> {
    state: &'a AppState,
}

impl<'a> DashboardService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn stats(&self) -> Result<DashboardStats, ApiError> {
        let store = self.state.store.as_ref();
        let today = self.state.clock.today();

        let active = active_cases();
        let urgent = active_cases().eq("is_urgent", true);
        let interventions = SelectQuery::table(Table::Interventions).eq("is_active", true);
        let meetings = SelectQuery::table(Table::ParentMeetings)
            .is_in("meeting_status", strings(MeetingStatus::UPCOMING))
            .filter(ColumnRef::base("meeting_date"), Operand::Gte(json!(today)))
            .filter(
                ColumnRef::base("meeting_date"),
                Operand::Lte(json!(today + Duration::days(UPCOMING_DAYS))),
            );

        let (active_cases, urgent_cases, active_interventions, upcoming_meetings) = futures::try_join!(
            store.count(&active),
            store.count(&urgent),
            store.count(&interventions),
            store.count(&meetings),
        )?;

        Ok(DashboardStats {
            active_cases,
            urgent_cases,
            active_interventions,
            upcoming_meetings,
        })
    }

    /// Totals over every case the caller manages; tier and urgency over the active ones.
    pub async fn case_load(&self, caller: &Caller) -> Result<CaseLoad, ApiError> {
        let query = SelectQuery::table(Table::Cases)
            .columns(&["status", "tier", "is_urgent"])
            .eq("case_manager_id", caller.id.to_string());
        let cases = self.state.store.select(&query).await?;

        let mut load = CaseLoad {
            total: cases.len(),
            ..Default::default()
        };
        for case in cases.iter().filter(|c| is_active(c)) {
            match row_str(case, "status") {
                Some("OPEN") => load.open += 1,
                Some("ON_HOLD") => load.on_hold += 1,
                _ => {}
            }
            match case.get("tier").and_then(Value::as_i64) {
                Some(1) => load.tier_1 += 1,
                Some(2) => load.tier_2 += 1,
                Some(3) => load.tier_3 += 1,
                _ => {}
            }
            if case.get("is_urgent") == Some(&Value::Bool(true)) {
                load.urgent += 1;
            }
        }
        Ok(load)
    }

    /// Urgent active cases, longest open first.
    pub async fn urgent_cases(&self) -> Result<Vec<Row>, ApiError> {
        let query = active_cases()
            .eq("is_urgent", true)
            .embed(STUDENT_EMBED)
            .embed(CASE_MANAGER)
            .order_by(OrderBy::asc(ColumnRef::base("opened_date")))
            .order_by(ID_TIEBREAK);
        let rows = self.state.store.select(&query).await?;
        let today = self.state.clock.today();

        Ok(rows
            .iter()
            .map(|row| {
                let mut item = case_item(row);
                item.insert("days_open".into(), days_open(row, today).map_or(Value::Null, Value::from));
                item
            })
            .collect())
    }

    /// The caller's active cases, urgent first then oldest first.
    pub async fn my_cases(&self, caller: &Caller) -> Result<Vec<Row>, ApiError> {
        let query = active_cases()
            .eq("case_manager_id", caller.id.to_string())
            .embed(STUDENT_EMBED)
            .embed(CASE_MANAGER)
            .order_by(OrderBy::desc(ColumnRef::base("is_urgent")))
            .order_by(OrderBy::asc(ColumnRef::base("opened_date")))
            .order_by(ID_TIEBREAK);
        let mut rows = self.state.store.select(&query).await?;
        attach_child_counts(self.state.store.as_ref(), &mut rows, &INTERVENTION_COUNT).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut item = case_item(row);
                item.insert("intervention_count".into(), row.get("intervention_count").cloned().unwrap_or(json!(0)));
                item
            })
            .collect())
    }

    /// Active cases grouped by student grade, ordered by grade.
    pub async fn tier_distribution(&self) -> Result<Vec<GradeTiers>, ApiError> {
        let query = active_cases().columns(&["id", "student_id", "tier"]).embed(STUDENT_EMBED);
        let cases = self.state.store.select(&query).await?;

        let mut grades: BTreeMap<String, GradeTiers> = BTreeMap::new();
        for case in &cases {
            let grade = match embedded_str(case, "student", "grade", "Unknown") {
                Value::String(s) => s,
                _ => "Unknown".to_string(),
            };
            let entry = grades.entry(grade.clone()).or_insert_with(|| GradeTiers {
                grade,
                ..Default::default()
            });
            entry.total += 1;
            match case.get("tier").and_then(Value::as_i64) {
                Some(1) => entry.tier_1 += 1,
                Some(2) => entry.tier_2 += 1,
                Some(3) => entry.tier_3 += 1,
                _ => {}
            }
        }
        Ok(grades.into_values().collect())
    }
}

fn case_item(row: &Row) -> Row {
    let mut item = pick(
        row,
        &["id", "student_id", "case_type", "tier", "status", "is_urgent", "opened_date", "case_manager_id"],
    );
    item.insert("student_name".into(), embedded_str(row, "student", "name", "Unknown"));
    item.insert("student_grade".into(), embedded_str(row, "student", "grade", "Unknown"));
    item.insert(
        "case_manager_name".into(),
        display_name(row.get("case_manager")).map_or(Value::Null, Value::String),
    );
    item
}

fn days_open(row: &Row, today: NaiveDate) -> Option<i64> {
    let opened: NaiveDate = row_str(row, "opened_date")?.get(..10)?.parse().ok()?;
    Some((today - opened).num_days())
}
