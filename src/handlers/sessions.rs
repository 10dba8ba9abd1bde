use axum::extract::{Path, State};

use crate::api::{JsonObject, QueryParams};
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::SessionService;

/// GET /sessions
pub async fn list(State(state): State<AppState>, params: QueryParams) -> ApiResult<Vec<Row>> {
    let (rows, count) = SessionService::new(&state).list(&params).await?;
    Ok(ApiResponse::list(rows, count))
}

/// POST /sessions
pub async fn create(State(state): State<AppState>, JsonObject(body): JsonObject) -> ApiResult<Row> {
    Ok(ApiResponse::created(SessionService::new(&state).create_one(&body).await?))
}

/// GET /sessions/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Row> {
    Ok(ApiResponse::success(SessionService::new(&state).select_404(&id).await?))
}

/// PATCH /sessions/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(SessionService::new(&state).update_404(&id, &body).await?))
}
