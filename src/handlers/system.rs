use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::config;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// GET / - service information
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "SSS Case API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config::config().environment,
        "endpoints": {
            "cases": "/cases[/:id[/assign-manager]] (staff)",
            "students": "/students[/:id] (staff)",
            "interventions": "/interventions[/:id] (staff)",
            "sessions": "/sessions[/:id] (staff)",
            "meetings": "/meetings[/:id] (staff)",
            "files": "/files[/:id] (staff)",
            "dashboard": "/dashboard/* (staff)",
            "users": "/users/:id (own profile)",
            "health": "/health (public)",
        }
    }))
}

/// GET /health - store reachability
pub async fn health(State(state): State<AppState>) -> Response {
    let now = state.clock.now();
    match state.store.ping().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok",
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "data": { "status": "degraded", "timestamp": now },
                    "error": format!("Database unavailable: {}", e),
                })),
            )
                .into_response()
        }
    }
}

/// Any unrouted path.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
