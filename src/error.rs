// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::database::StoreError;
use crate::filter::QueryError;

pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthorized - Please log in";
pub const NOT_PROVISIONED_MESSAGE: &str = "User not found";
pub const STAFF_ONLY_MESSAGE: &str = "Forbidden - Only SSS staff can access this resource";
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Request body too large";
pub const UNEXPECTED_MESSAGE: &str = "Internal server error";

/// Every failure a handler can report. Each variant maps to one status code and
/// renders as `{ "data": null, "error": <message> }`.
#[derive(Debug)]
pub enum ApiError {
    // 401 Unauthorized
    Unauthenticated,

    // 404 Not Found (valid session, no users row)
    IdentityNotProvisioned,

    // 403 Forbidden
    Forbidden(String),

    // 400 Bad Request
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    },

    // 404 Not Found
    NotFound(String),

    // 400 Bad Request (state conflict, e.g. closing a closed case)
    Conflict(String),

    // 413 Payload Too Large (body over the configured limit)
    PayloadTooLarge,

    // 500 Internal Server Error, underlying store message surfaced
    StoreError(String),

    // 500 Internal Server Error, generic message
    UnexpectedError,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::IdentityNotProvisioned => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-facing error message
    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthenticated => UNAUTHENTICATED_MESSAGE.to_string(),
            ApiError::IdentityNotProvisioned => NOT_PROVISIONED_MESSAGE.to_string(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::PayloadTooLarge => PAYLOAD_TOO_LARGE_MESSAGE.to_string(),
            ApiError::StoreError(msg) => format!("Database error: {}", msg),
            ApiError::UnexpectedError => UNEXPECTED_MESSAGE.to_string(),
        }
    }

    /// Get error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::IdentityNotProvisioned => "IDENTITY_NOT_PROVISIONED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::StoreError(_) => "STORE_ERROR",
            ApiError::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "data": null,
            "error": self.message(),
        });
        if let ApiError::ValidationError { field_errors: Some(fields), .. } = self {
            body["field_errors"] = json!(fields);
        }
        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn staff_only() -> Self {
        ApiError::Forbidden(STAFF_ONLY_MESSAGE.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn validation_fields(message: impl Into<String>, field_errors: BTreeMap<String, String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Missing required body fields, named in the message.
    pub fn missing_fields(fields: &[&str]) -> Self {
        let message = match fields {
            [] => "Missing required fields".to_string(),
            [one] => format!("Missing required field: {} is required", one),
            [init @ .., last] => format!(
                "Missing required fields: {} and {} are required",
                init.join(", "),
                last
            ),
        };
        ApiError::validation(message)
    }

    pub fn not_found(label: &str) -> Self {
        ApiError::NotFound(format!("{} not found", label))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        ApiError::StoreError(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = match &err {
            StoreError::Sqlx(sqlx::Error::Database(db)) => db.message().to_string(),
            other => other.to_string(),
        };
        tracing::error!(error = %err, "store operation failed");
        ApiError::StoreError(message)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid request body: {}", err))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self.message());
        } else {
            tracing::debug!(code = self.error_code(), status = status.as_u16(), "{}", self.message());
        }
        (status, Json(self.to_json())).into_response()
    }
}
