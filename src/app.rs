//! Shared state and the HTTP router.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::IdentityProvider;
use crate::clock::Clock;
use crate::config::{self, ApiConfig, SecurityConfig};
use crate::database::Store;
use crate::error::ApiError;
use crate::filter::PageLimits;
use crate::handlers;
use crate::middleware::{require_authenticated, require_staff};
use crate::services::{EntityDef, Resource};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub limits: PageLimits,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            identity,
            clock,
            limits: PageLimits::from_config(&config::config().query),
        }
    }

    pub fn resource(&self, def: &'static EntityDef) -> Resource<'_> {
        Resource::new(def, self.store.as_ref(), self.clock.as_ref())
    }
}

pub fn router(state: AppState) -> Router {
    let config = config::config();

    let app = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        // Staff only
        .merge(staff_routes(state.clone()))
        // Any provisioned user
        .merge(profile_routes(state.clone()))
        .fallback(handlers::system::not_found)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(&config.security))
        .with_state(state);

    request_tracing(app, &config.api)
}

fn request_tracing(app: Router, api: &ApiConfig) -> Router {
    if api.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

fn staff_routes(state: AppState) -> Router<AppState> {
    use handlers::{cases, dashboard, files, interventions, meetings, sessions, students};

    Router::new()
        .route("/cases", get(cases::list).post(cases::create))
        .route("/cases/:id", get(cases::get).patch(cases::update).delete(cases::close))
        .route("/cases/:id/assign-manager", post(cases::assign_manager))
        .route("/students", get(students::list).post(students::create))
        .route("/students/:id", get(students::get).patch(students::update))
        .route("/interventions", get(interventions::list).post(interventions::create))
        .route(
            "/interventions/:id",
            get(interventions::get)
                .patch(interventions::update)
                .delete(interventions::delete),
        )
        .route("/meetings", get(meetings::list).post(meetings::create))
        .route("/meetings/:id", get(meetings::get).patch(meetings::update))
        .route("/sessions", get(sessions::list).post(sessions::create))
        .route("/sessions/:id", get(sessions::get).patch(sessions::update))
        .route("/files", get(files::list).post(files::create))
        .route("/files/:id", get(files::get).delete(files::delete))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/case-load", get(dashboard::case_load))
        .route("/dashboard/urgent-cases", get(dashboard::urgent_cases))
        .route("/dashboard/my-cases", get(dashboard::my_cases))
        .route("/dashboard/tier-distribution", get(dashboard::tier_distribution))
        .route("/dashboard/case-statistics", get(dashboard::case_statistics))
        .route_layer(from_fn_with_state(state, require_staff))
}

fn profile_routes(state: AppState) -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/users/:id", get(users::get).patch(users::update))
        .route_layer(from_fn_with_state(state, require_authenticated))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let methods = [Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS];
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(AnyOrigin).allow_methods(methods).allow_headers(AnyOrigin);
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(AnyOrigin)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);
    ApiError::UnexpectedError.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtIdentityProvider;
    use crate::clock::FixedClock;
    use crate::database::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
            identity: Arc::new(JwtIdentityProvider::new("router-test", None, "sb-access-token").unwrap()),
            clock: Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())),
            limits: PageLimits::default(),
        }
    }

    async fn call(uri: &str) -> (StatusCode, Value) {
        let res = router(state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn staff_routes_require_a_token() {
        let (status, body) = call("/cases").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["data"].is_null());
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_routes_use_the_envelope() {
        let (status, body) = call("/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn request_tracing_is_optional() {
        for enable_request_logging in [true, false] {
            let api = ApiConfig {
                enable_request_logging,
                ..config::config().api.clone()
            };
            let app = request_tracing(Router::new().route("/", get(|| async { "ok" })), &api);
            let res = app.oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn health_reports_store_status() {
        let (status, body) = call("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["database"], "ok");
    }
}
