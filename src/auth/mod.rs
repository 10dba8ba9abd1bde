//! Identity provider adapter.
//!
//! Sessions are issued by an external auth service as HS256 JWTs. This module
//! only turns a request's bearer token or session cookie into an `Identity`;
//! role decisions belong to the authorization gate.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{self, SecurityConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            aud: config::config().security.jwt_audience.clone(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Who the session belongs to, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the request carries no valid session.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError>;
}

/// Role stored on the `users` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SssStaff,
    Teacher,
    Parent,
    PrincipalAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SssStaff => "SSS_STAFF",
            Role::Teacher => "TEACHER",
            Role::Parent => "PARENT",
            Role::PrincipalAdmin => "PRINCIPAL_ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "SSS_STAFF" => Some(Role::SssStaff),
            "TEACHER" => Some(Role::Teacher),
            "PARENT" => Some(Role::Parent),
            "PRINCIPAL_ADMIN" => Some(Role::PrincipalAdmin),
            _ => None,
        }
    }
}

/// Validates HS256 session tokens from the `Authorization` header or the
/// session cookie.
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, audience: Option<&str>, cookie_name: impl Into<String>) -> Result<Self, IdentityError> {
        if secret.is_empty() {
            return Err(IdentityError::Misconfigured("JWT_SECRET is empty".to_string()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            cookie_name: cookie_name.into(),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, IdentityError> {
        Self::new(
            &security.jwt_secret,
            security.jwt_audience.as_deref(),
            security.session_cookie.clone(),
        )
    }

    fn token<'h>(&self, headers: &'h HeaderMap) -> Option<&'h str> {
        bearer_token(headers).or_else(|| cookie_value(headers, &self.cookie_name))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError> {
        let Some(token) = self.token(headers) else {
            return Ok(None);
        };
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(Some(Identity {
                id: data.claims.sub,
                email: data.claims.email,
            })),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                Ok(None)
            }
        }
    }
}

/// Extract JWT token from Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?.trim();
    (!token.is_empty()).then_some(token)
}

fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}
