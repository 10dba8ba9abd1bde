use axum::extract::{Path, State};
use axum::Extension;
use serde_json::Value;

use crate::api::{JsonObject, QueryParams};
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::FileService;

/// GET /files
pub async fn list(State(state): State<AppState>, params: QueryParams) -> ApiResult<Vec<Row>> {
    let (rows, count) = FileService::new(&state).list(&params).await?;
    Ok(ApiResponse::list(rows, count))
}

/// POST /files
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::created(FileService::new(&state).create_one(&caller, &body).await?))
}

/// GET /files/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Row> {
    Ok(ApiResponse::success(FileService::new(&state).select_404(&id).await?))
}

/// DELETE /files/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    Ok(ApiResponse::success(FileService::new(&state).delete_404(&id).await?))
}
