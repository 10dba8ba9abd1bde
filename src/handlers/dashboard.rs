use axum::extract::State;
use axum::Extension;

use crate::app::AppState;
use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::cases::CaseStatistics;
use crate::services::dashboard::{CaseLoad, DashboardStats, GradeTiers};
use crate::services::{CaseService, DashboardService};

/// GET /dashboard/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::success(DashboardService::new(&state).stats().await?))
}

/// GET /dashboard/case-load
pub async fn case_load(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<CaseLoad> {
    Ok(ApiResponse::success(DashboardService::new(&state).case_load(&caller).await?))
}

/// GET /dashboard/urgent-cases
pub async fn urgent_cases(State(state): State<AppState>) -> ApiResult<Vec<Row>> {
    let rows = DashboardService::new(&state).urgent_cases().await?;
    let count = rows.len() as i64;
    Ok(ApiResponse::list(rows, count))
}

/// GET /dashboard/my-cases
pub async fn my_cases(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Vec<Row>> {
    let rows = DashboardService::new(&state).my_cases(&caller).await?;
    let count = rows.len() as i64;
    Ok(ApiResponse::list(rows, count))
}

/// GET /dashboard/tier-distribution
pub async fn tier_distribution(State(state): State<AppState>) -> ApiResult<Vec<GradeTiers>> {
    Ok(ApiResponse::success(DashboardService::new(&state).tier_distribution().await?))
}

/// GET /dashboard/case-statistics
pub async fn case_statistics(State(state): State<AppState>) -> ApiResult<CaseStatistics> {
    Ok(ApiResponse::success(CaseService::new(&state).statistics().await?))
}
