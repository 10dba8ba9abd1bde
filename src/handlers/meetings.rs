use axum::extract::{Path, State};

use crate::api::{JsonObject, QueryParams};
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::MeetingService;

/// GET /meetings
pub async fn list(State(state): State<AppState>, params: QueryParams) -> ApiResult<Vec<Row>> {
    let (rows, count) = MeetingService::new(&state).list(&params).await?;
    Ok(ApiResponse::list(rows, count))
}

/// POST /meetings
pub async fn create(State(state): State<AppState>, JsonObject(body): JsonObject) -> ApiResult<Row> {
    Ok(ApiResponse::created(MeetingService::new(&state).create_one(&body).await?))
}

/// GET /meetings/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Row> {
    Ok(ApiResponse::success(MeetingService::new(&state).select_404(&id).await?))
}

/// PATCH /meetings/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(MeetingService::new(&state).update_404(&id, &body).await?))
}
