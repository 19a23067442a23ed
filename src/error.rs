//! Domain error taxonomy and Axum response conversions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// One field-level validation failure, attached to the input field it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Everything one validation pass collected. Empty means the input was fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields that failed, for log lines.
    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid fields: {}", self.fields().join(", "))
    }
}

/// Outcome taxonomy for authentication and verification flows.
///
/// Every variant is a value handlers can match and tests can compare with
/// `==`. `Storage` and `Delivery` carry no payload on purpose: the
/// infrastructure detail is logged at the boundary that translated it, and
/// clients only ever see the generic message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Deliberately does not distinguish "no such user" from "wrong
    /// password" or "password-less OAuth account".
    #[error("Invalid credentials!")]
    InvalidCredentials,

    #[error("Email already in use!")]
    EmailInUse,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Something went wrong!")]
    Storage,

    #[error("Something went wrong!")]
    Delivery,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AuthError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid fields!", "fields": errors.0 }),
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": self.to_string() }),
            ),
            AuthError::EmailInUse => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            AuthError::InvalidToken | AuthError::TokenExpired => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.to_string() }),
            ),
            // Detail was already logged where the failure was translated.
            AuthError::Storage | AuthError::Delivery => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
