use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::cases::CASE;
use super::resource::{display_name, object, parse_body, pick, EntityDef};
use crate::api::{entity_id, QueryParams};
use crate::app::AppState;
use crate::database::{row_str, ColumnRef, Embed, Row, Table};
use crate::error::ApiError;
use crate::filter::{FilterDef, FilterKind, ListDef, SortDef, SortOption};
use crate::middleware::Caller;
use crate::types::blank_as_none;

const UPLOADER: Embed = Embed::left("uploader", Table::Users, "uploaded_by", &["id", "email", "first_name", "last_name"]);

pub static FILE: EntityDef = EntityDef {
    table: Table::Files,
    label: "File",
    detail_embeds: &[UPLOADER],
};

const LIST_COLUMNS: &[&str] = &[
    "id",
    "case_id",
    "session_id",
    "uploaded_by",
    "file_name",
    "file_type",
    "file_size",
    "file_url",
    "description",
    "tags",
    "created_at",
];

pub const FILE_LIST: ListDef = ListDef {
    table: Table::Files,
    columns: Some(LIST_COLUMNS),
    embeds: &[UPLOADER],
    filters: &[
        FilterDef::base("case_id", FilterKind::Uuid),
        FilterDef::base("uploaded_by", FilterKind::Uuid),
        FilterDef::base("file_type", FilterKind::Text),
    ],
    search: None,
    sort: SortDef {
        default_key: "created_at",
        default_descending: true,
        options: &[
            SortOption::new("created_at", ColumnRef::base("created_at")),
            SortOption::new("file_name", ColumnRef::base("file_name")),
        ],
    },
};

#[derive(Debug, Deserialize)]
struct NewFile {
    #[serde(default, deserialize_with = "blank_as_none")]
    case_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    session_id: Option<Uuid>,
    #[serde(default, deserialize_with = "blank_as_none")]
    file_name: Option<String>,
    file_type: Option<String>,
    file_size: Option<i64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    file_url: Option<String>,
    storage_path: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

pub struct FileService<'a> {
    state: &'a AppState,
}

impl<'a> FileService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Records an already-uploaded object against a case.
    pub async fn create_one(&self, caller: &Caller, body: &Row) -> Result<Row, ApiError> {
        let input: NewFile = parse_body(body)?;
        let (Some(file_name), Some(file_url), Some(case_id)) =
            (input.file_name, input.file_url, input.case_id.as_deref())
        else {
            return Err(ApiError::missing_fields(&["file_name", "file_url", "case_id"]));
        };

        let case_id = entity_id(case_id, CASE.label)?;
        self.state.resource(&CASE).exists_404(case_id).await?;

        let row = object(json!({
            "case_id": case_id,
            "session_id": input.session_id,
            "uploaded_by": caller.id,
            "file_name": file_name,
            "file_type": input.file_type,
            "file_size": input.file_size,
            "file_url": file_url,
            "storage_path": input.storage_path,
            "description": input.description,
            "tags": input.tags,
        }));
        self.state.resource(&FILE).create_one(row).await
    }

    pub async fn select_404(&self, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, FILE.label)?;
        self.state.resource(&FILE).select_404(id).await
    }

    pub async fn list(&self, params: &QueryParams) -> Result<(Vec<Row>, i64), ApiError> {
        let (rows, count) = self
            .state
            .resource(&FILE)
            .list(&FILE_LIST, params, self.state.limits)
            .await?;
        Ok((rows.iter().map(list_item).collect(), count))
    }

    /// Removes the record. The stored object is left to the caller.
    pub async fn delete_404(&self, raw_id: &str) -> Result<Value, ApiError> {
        let id = entity_id(raw_id, FILE.label)?;
        let removed = self.state.resource(&FILE).delete_404(id).await?;
        Ok(json!({
            "id": row_str(&removed, "id").unwrap_or_default(),
            "file_url": removed.get("file_url").cloned().unwrap_or(Value::Null),
        }))
    }
}

fn list_item(row: &Row) -> Row {
    let mut item = pick(row, LIST_COLUMNS);
    item.insert(
        "uploader_name".into(),
        display_name(row.get("uploader")).map_or(Value::Null, Value::String),
    );
    item
}
