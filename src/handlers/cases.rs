use axum::extract::{Path, State};
use axum::Extension;

use crate::api::{JsonObject, QueryParams};
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::CaseService;

/// GET /cases
pub async fn list(State(state): State<AppState>, params: QueryParams) -> ApiResult<Vec<Row>> {
    let (rows, count) = CaseService::new(&state).list(&params).await?;
    Ok(ApiResponse::list(rows, count))
}

/// POST /cases
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    let case = CaseService::new(&state).create_one(&caller, &body).await?;
    Ok(ApiResponse::created(case))
}

/// GET /cases/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Row> {
    Ok(ApiResponse::success(CaseService::new(&state).select_404(&id).await?))
}

/// PATCH /cases/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(CaseService::new(&state).update_404(&id, &body).await?))
}

/// DELETE /cases/:id closes the case; rows are never removed.
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(CaseService::new(&state).close_404(&id, &body).await?))
}

/// POST /cases/:id/assign-manager
pub async fn assign_manager(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(CaseService::new(&state).assign_manager(&id, &body).await?))
}
