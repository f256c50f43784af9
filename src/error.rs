use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

/// FieldError
///
/// A single field-level validation failure, returned inside a 400 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// ApiError
///
/// The uniform failure type returned by every handler, extractor and guard.
/// Each variant maps to exactly one HTTP status; see `into_response`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("unauthorized")]
    Unauthorized,

    /// Role or permission mismatch. `redirect` carries the caller's landing
    /// route when the denial came from a role guard.
    #[error("forbidden")]
    Forbidden { redirect: Option<String> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a single-field validation failure.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn forbidden() -> Self {
        Self::Forbidden { redirect: None }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(fields) => (
                status,
                Json(serde_json::json!({ "error": "validation failed", "fields": fields })),
            )
                .into_response(),
            Self::Unauthorized => {
                (status, Json(serde_json::json!({ "error": "unauthorized" }))).into_response()
            }
            Self::Forbidden { redirect: Some(target) } => (
                status,
                [(header::LOCATION, target.clone())],
                Json(serde_json::json!({ "error": "forbidden", "redirect": target })),
            )
                .into_response(),
            Self::Forbidden { redirect: None } => {
                (status, Json(serde_json::json!({ "error": "forbidden" }))).into_response()
            }
            Self::NotFound(msg) | Self::Conflict(msg) => {
                (status, Json(serde_json::json!({ "error": msg }))).into_response()
            }
            Self::Internal(msg) => {
                // The detail stays in the logs; clients only see a generic message.
                tracing::error!(error = %msg, "internal server error");
                (
                    status,
                    Json(serde_json::json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource not found".into()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                Self::Conflict("resource already exists".into())
            }
            _ => Self::Internal(format!("database error: {err}")),
        }
    }
}
