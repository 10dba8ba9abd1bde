use axum::extract::{Path, State};
use serde_json::Value;

use crate::api::{JsonObject, QueryParams};
use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::InterventionService;

/// GET /interventions
pub async fn list(State(state): State<AppState>, params: QueryParams) -> ApiResult<Vec<Row>> {
    let (rows, count) = InterventionService::new(&state).list(&params).await?;
    Ok(ApiResponse::list(rows, count))
}

/// POST /interventions
pub async fn create(State(state): State<AppState>, JsonObject(body): JsonObject) -> ApiResult<Row> {
    Ok(ApiResponse::created(InterventionService::new(&state).create_one(&body).await?))
}

/// GET /interventions/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Row> {
    Ok(ApiResponse::success(InterventionService::new(&state).select_404(&id).await?))
}

/// PATCH /interventions/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult<Row> {
    Ok(ApiResponse::success(InterventionService::new(&state).update_404(&id, &body).await?))
}

/// DELETE /interventions/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    Ok(ApiResponse::success(InterventionService::new(&state).delete_404(&id).await?))
}
