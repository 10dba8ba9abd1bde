//! Request extractors shared by every handler.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::database::Row;
use crate::error::ApiError;

/// JSON object body. An empty body reads as `{}`; anything that is not a JSON
/// object is a validation error rendered in the standard envelope.
#[derive(Debug, Clone, Default)]
pub struct JsonObject(pub Row);

impl JsonObject {
    pub fn parse(bytes: &[u8]) -> Result<Self, ApiError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(ApiError::validation("Request body must be a JSON object")),
            Err(e) => Err(ApiError::validation(format!("Invalid JSON body: {}", e))),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| match e.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
            _ => ApiError::validation(format!("Invalid request body: {}", e.body_text())),
        })?;
        Self::parse(&bytes)
    }
}

/// Query string as a multimap. Repeated keys and comma-separated values both
/// contribute to `values`.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(BTreeMap<String, Vec<String>>);

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(raw) = raw {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                map.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        Self(map)
    }

    /// First non-empty value for `key`, trimmed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)?
            .iter()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Every value for `key`, splitting comma lists and dropping blanks.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .map(|vs| {
                vs.iter()
                    .flat_map(|v| v.split(','))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in pairs {
            map.entry(k.to_string()).or_default().push(v.to_string());
        }
        Self(map)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query()))
    }
}

/// Parses a path or reference id. Anything that is not a UUID cannot name a
/// row, so it is reported as the entity being absent.
pub fn entity_id(raw: &str, label: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(label))
}
