//! Static catalogue of the tables the API reads and writes.
//!
//! Column kinds drive parameter casts in the PostgreSQL backend and value
//! comparisons in the in-memory backend. Foreign keys carry the on-delete
//! behaviour both backends honour.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Students,
    Cases,
    Interventions,
    Sessions,
    ParentMeetings,
    Files,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Users,
        Table::Students,
        Table::Cases,
        Table::Interventions,
        Table::Sessions,
        Table::ParentMeetings,
        Table::Files,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Students => "students",
            Table::Cases => "cases",
            Table::Interventions => "interventions",
            Table::Sessions => "sessions",
            Table::ParentMeetings => "parent_meetings",
            Table::Files => "files",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn schema(&self) -> &'static TableSchema {
        match self {
            Table::Users => &USERS,
            Table::Students => &STUDENTS,
            Table::Cases => &CASES,
            Table::Interventions => &INTERVENTIONS,
            Table::Sessions => &SESSIONS,
            Table::ParentMeetings => &PARENT_MEETINGS,
            Table::Files => &FILES,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    /// Stored as a PostgreSQL enum; compared through its text form.
    Enum,
    Int,
    Bool,
    Date,
    Time,
    Timestamp,
    TextArray,
    UuidArray,
    Json,
}

impl ColumnKind {
    /// Type a bound text parameter is cast to before comparison.
    pub fn param_type(&self) -> &'static str {
        match self {
            ColumnKind::Uuid => "uuid",
            ColumnKind::Text | ColumnKind::Enum => "text",
            ColumnKind::Int => "bigint",
            ColumnKind::Bool => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::Timestamp => "timestamptz",
            ColumnKind::TextArray => "text[]",
            ColumnKind::UuidArray => "uuid[]",
            ColumnKind::Json => "jsonb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: Table,
    pub on_delete: OnDelete,
}

#[derive(Debug)]
pub struct TableSchema {
    pub table: Table,
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Foreign keys in any table that point at `target`.
    pub fn referencing(target: Table) -> impl Iterator<Item = (&'static TableSchema, &'static ForeignKey)> {
        Table::ALL.into_iter().flat_map(move |t| {
            let schema = t.schema();
            schema
                .foreign_keys
                .iter()
                .filter(move |fk| fk.references == target)
                .map(move |fk| (schema, fk))
        })
    }
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const fn fk(column: &'static str, references: Table, on_delete: OnDelete) -> ForeignKey {
    ForeignKey { column, references, on_delete }
}

use ColumnKind::*;

static USERS: TableSchema = TableSchema {
    table: Table::Users,
    columns: &[
        col("id", Uuid),
        col("email", Text),
        col("first_name", Text),
        col("last_name", Text),
        col("role", Enum),
        col("school_id", Uuid),
        col("sss_position", Text),
        col("google_id", Text),
        col("department", Text),
        col("phone", Text),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[],
};

static STUDENTS: TableSchema = TableSchema {
    table: Table::Students,
    columns: &[
        col("id", Uuid),
        col("name", Text),
        col("grade", Text),
        col("date_of_birth", Date),
        col("student_id", Text),
        col("nationality", Text),
        col("mother_tongue", Text),
        col("start_date_at_atlas", Date),
        col("previous_school", Text),
        col("primary_teacher_id", Uuid),
        col("school_id", Uuid),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
        col("archived_at", Timestamp),
    ],
    foreign_keys: &[fk("primary_teacher_id", Table::Users, OnDelete::SetNull)],
};

static CASES: TableSchema = TableSchema {
    table: Table::Cases,
    columns: &[
        col("id", Uuid),
        col("student_id", Uuid),
        col("case_type", Enum),
        col("tier", Int),
        col("status", Enum),
        col("intervention_types", TextArray),
        col("is_urgent", Bool),
        col("opened_date", Date),
        col("expected_closure_date", Date),
        col("closed_date", Date),
        col("closure_reason", Text),
        col("case_manager_id", Uuid),
        col("secondary_supporters", UuidArray),
        col("reason_for_referral", Text),
        col("referral_source", Enum),
        col("internal_notes", Text),
        col("created_by", Uuid),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[
        fk("student_id", Table::Students, OnDelete::Cascade),
        fk("case_manager_id", Table::Users, OnDelete::SetNull),
        fk("created_by", Table::Users, OnDelete::SetNull),
    ],
};

static INTERVENTIONS: TableSchema = TableSchema {
    table: Table::Interventions,
    columns: &[
        col("id", Uuid),
        col("case_id", Uuid),
        col("type", Enum),
        col("tier", Int),
        col("intervention_name", Text),
        col("description", Text),
        col("start_date", Date),
        col("estimated_end_date", Date),
        col("actual_end_date", Date),
        col("duration_weeks", Int),
        col("frequency", Text),
        col("delivery_format", Text),
        col("facilitator_id", Uuid),
        col("location", Text),
        col("is_active", Bool),
        col("reason_for_ending", Text),
        col("is_escalatable_tier", Bool),
        col("escalated_from_intervention_id", Uuid),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[
        fk("case_id", Table::Cases, OnDelete::Cascade),
        fk("facilitator_id", Table::Users, OnDelete::SetNull),
        fk("escalated_from_intervention_id", Table::Interventions, OnDelete::SetNull),
    ],
};

static SESSIONS: TableSchema = TableSchema {
    table: Table::Sessions,
    columns: &[
        col("id", Uuid),
        col("intervention_id", Uuid),
        col("session_date", Date),
        col("session_time", Time),
        col("duration", Int),
        col("facilitator_id", Uuid),
        col("student_attended", Bool),
        col("student_notes", Text),
        col("observation_notes", Text),
        col("student_progress", Text),
        col("challenges", Text),
        col("teacher_feedback", Text),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[
        fk("intervention_id", Table::Interventions, OnDelete::Cascade),
        fk("facilitator_id", Table::Users, OnDelete::SetNull),
    ],
};

static PARENT_MEETINGS: TableSchema = TableSchema {
    table: Table::ParentMeetings,
    columns: &[
        col("id", Uuid),
        col("student_id", Uuid),
        col("case_id", Uuid),
        col("meeting_date", Date),
        col("meeting_time", Time),
        col("parent_ids", UuidArray),
        col("sss_staff_id", Uuid),
        col("teacher_ids", UuidArray),
        col("admin_id", Uuid),
        col("is_scheduled", Bool),
        col("meeting_status", Enum),
        col("cancellation_reason", Text),
        col("rescheduled_date", Date),
        col("agenda", Text),
        col("agenda_link", Text),
        col("meeting_notes", Text),
        col("next_steps", Text),
        col("action_plan", Json),
        col("next_meeting_date", Date),
        col("reminder_sent", Bool),
        col("reminder_sent_date", Date),
        col("frequency", Text),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[
        fk("student_id", Table::Students, OnDelete::Cascade),
        fk("case_id", Table::Cases, OnDelete::Cascade),
        fk("sss_staff_id", Table::Users, OnDelete::SetNull),
        fk("admin_id", Table::Users, OnDelete::SetNull),
    ],
};

static FILES: TableSchema = TableSchema {
    table: Table::Files,
    columns: &[
        col("id", Uuid),
        col("case_id", Uuid),
        col("session_id", Uuid),
        col("uploaded_by", Uuid),
        col("file_name", Text),
        col("file_type", Text),
        col("file_size", Int),
        col("file_url", Text),
        col("storage_path", Text),
        col("description", Text),
        col("tags", TextArray),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    foreign_keys: &[
        fk("case_id", Table::Cases, OnDelete::Cascade),
        fk("session_id", Table::Sessions, OnDelete::SetNull),
        fk("uploaded_by", Table::Users, OnDelete::SetNull),
    ],
};
