use axum::extract::{Path, State};
use axum::Extension;

use crate::api::JsonObject;
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::UserService;

/// GET /users/:id, own profile only.
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(UserService::new(&state).select_404(&caller, &id).await?))
}

/// PATCH /users/:id, own profile only.
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(UserService::new(&state).update_404(&caller, &id, &body).await?))
}
