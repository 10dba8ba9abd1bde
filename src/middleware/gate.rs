use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Role;
use crate::database::{row_str, Row, SelectQuery, Table};
use crate::error::ApiError;

/// What a route group demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Authenticated,
    Role(Role),
}

/// Caller resolved by the gate and handed to handlers as an extension.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub profile: Row,
}

impl Caller {
    pub fn is_staff(&self) -> bool {
        self.role == Some(Role::SssStaff)
    }
}

/// Session -> provisioned user -> role check.
pub async fn authorize(state: &AppState, headers: &HeaderMap, policy: AccessPolicy) -> Result<Caller, ApiError> {
    let identity = state
        .identity
        .resolve(headers)
        .await
        .map_err(|e| {
            tracing::error!("Identity provider failed: {}", e);
            ApiError::UnexpectedError
        })?
        .ok_or(ApiError::Unauthenticated)?;

    let profile = state
        .store
        .select_one(&SelectQuery::by_id(Table::Users, identity.id))
        .await?
        .ok_or_else(|| {
            tracing::warn!("Authorization denied: user {} has a session but no profile", identity.id);
            ApiError::IdentityNotProvisioned
        })?;

    let role = row_str(&profile, "role").and_then(Role::parse);

    if let AccessPolicy::Role(required) = policy {
        if role != Some(required) {
            tracing::warn!(
                "Authorization denied: user {} has role {:?}, requires {}",
                identity.id,
                row_str(&profile, "role"),
                required.as_str()
            );
            return Err(match required {
                Role::SssStaff => ApiError::staff_only(),
                other => ApiError::forbidden(format!("Forbidden - Requires {} role", other.as_str())),
            });
        }
    }

    tracing::debug!("Authorized user {} for {:?}", identity.id, policy);
    Ok(Caller {
        id: identity.id,
        email: identity.email,
        role,
        profile,
    })
}

async fn gate(state: &AppState, policy: AccessPolicy, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let caller = authorize(state, request.headers(), policy).await?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Route layer admitting SSS staff only.
pub async fn require_staff(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    gate(&state, AccessPolicy::Role(Role::SssStaff), request, next).await
}

/// Route layer admitting any provisioned user.
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, AccessPolicy::Authenticated, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims, JwtIdentityProvider};
    use crate::clock::SystemClock;
    use crate::database::MemoryStore;
    use crate::filter::PageLimits;
    use axum::http::{header, HeaderValue};
    use std::sync::Arc;

    const SECRET: &str = "gate-test-secret";
    const STAFF: &str = "aaaaaaaa-0000-4000-8000-000000000001";
    const TEACHER: &str = "aaaaaaaa-0000-4000-8000-000000000002";

    fn state() -> AppState {
        let store = MemoryStore::from_yaml(&format!(
            "users:\n  - {{ id: \"{STAFF}\", email: s@x.test, role: SSS_STAFF }}\n  - {{ id: \"{TEACHER}\", email: t@x.test, role: TEACHER }}\n"
        ))
        .unwrap();
        AppState {
            store: Arc::new(store),
            identity: Arc::new(JwtIdentityProvider::new(SECRET, None, "sb-access-token").unwrap()),
            clock: Arc::new(SystemClock),
            limits: PageLimits::default(),
        }
    }

    fn headers_for(id: &str) -> HeaderMap {
        let token = generate_jwt(&Claims::new(Uuid::parse_str(id).unwrap(), None, 1), SECRET).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    const STAFF_ONLY: AccessPolicy = AccessPolicy::Role(Role::SssStaff);

    #[tokio::test]
    async fn staff_pass_the_staff_gate() {
        let caller = authorize(&state(), &headers_for(STAFF), STAFF_ONLY).await.unwrap();
        assert!(caller.is_staff());
        assert_eq!(caller.id.to_string(), STAFF);
    }

    #[tokio::test]
    async fn each_step_fails_with_its_own_error() {
        let state = state();
        assert!(matches!(
            authorize(&state, &HeaderMap::new(), STAFF_ONLY).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            authorize(&state, &headers_for("aaaaaaaa-0000-4000-8000-0000000000ff"), STAFF_ONLY).await,
            Err(ApiError::IdentityNotProvisioned)
        ));
        assert!(matches!(
            authorize(&state, &headers_for(TEACHER), STAFF_ONLY).await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn any_provisioned_user_passes_the_authenticated_gate() {
        let caller = authorize(&state(), &headers_for(TEACHER), AccessPolicy::Authenticated).await.unwrap();
        assert_eq!(caller.role, Some(Role::Teacher));
    }
}
