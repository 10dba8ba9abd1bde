use serde::Deserialize;

use super::resource::{parse_body, EntityDef};
use crate::api::entity_id;
use crate::app::AppState;
use crate::database::{Row, Table};
use crate::error::ApiError;
use crate::middleware::Caller;

pub static USER: EntityDef = EntityDef {
    table: Table::Users,
    label: "User",
    detail_embeds: &[],
};

/// Profile fields a user may edit on themselves.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfilePatch {
    first_name: Option<String>,
    last_name: Option<String>,
    department: Option<String>,
    phone: Option<String>,
}

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn select_404(&self, caller: &Caller, raw_id: &str) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, USER.label)?;
        if id != caller.id {
            return Err(ApiError::forbidden("Forbidden - You can only view your own profile"));
        }
        self.state.resource(&USER).select_404(id).await
    }

    pub async fn update_404(&self, caller: &Caller, raw_id: &str, body: &Row) -> Result<Row, ApiError> {
        let id = entity_id(raw_id, USER.label)?;
        if id != caller.id {
            return Err(ApiError::forbidden("Forbidden - You can only update your own profile"));
        }
        let _: ProfilePatch = parse_body(body)?;
        self.state.resource(&USER).update_404(id, body.clone()).await
    }
}
