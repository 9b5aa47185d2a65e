use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use microcourses_store::StoreError;

/// API error taxonomy.
///
/// Every variant maps to a stable wire code and renders as
/// `{"error":{"code","message","field"?}}`.  Workflow code fails fast with
/// one of these; nothing is swallowed on the way out except internal
/// details, which are logged and replaced with a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields.
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
        field: Option<String>,
    },

    /// Missing or invalid credential.
    #[error("{message}")]
    Unauthorized {
        code: &'static str,
        message: String,
    },

    /// Role/ownership mismatch or unapproved creator.
    #[error("{0}")]
    Forbidden(String),

    /// Entity missing.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate enrollment/certificate or duplicate-key violation.
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        field: Option<String>,
    },

    /// Workflow precondition failed (course not published, course not
    /// completed).
    #[error("{message}")]
    Precondition {
        code: &'static str,
        message: String,
    },

    /// Per-IP request budget exhausted.
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Persistence or unexpected failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn missing_fields(message: impl Into<String>) -> Self {
        ApiError::Validation {
            code: "MISSING_FIELDS",
            message: message.into(),
            field: None,
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(
        code: &'static str,
        message: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            code: "UNAUTHORIZED",
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized {
            code: "INVALID_CREDENTIALS",
            message: "Invalid credentials".to_string(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn precondition(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Precondition {
            code,
            message: message.into(),
        }
    }

    /// The stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::Precondition { code, .. } => *code,
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited => "RATE_LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::BAD_REQUEST,
            ApiError::Precondition { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Resource"),
            StoreError::Duplicate { field } => ApiError::Conflict {
                code: "DUPLICATE_ERROR",
                message: format!("{field} already exists"),
                field: Some(field),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "Server Error".to_string()
            }
            other => other.to_string(),
        };

        let field = match &self {
            ApiError::Validation { field, .. } | ApiError::Conflict { field, .. } => field.clone(),
            _ => None,
        };

        let mut error = serde_json::json!({
            "code": code,
            "message": message,
        });
        if let Some(field) = field {
            error["field"] = serde_json::Value::String(field);
        }

        (status, axum::Json(serde_json::json!({ "error": error }))).into_response()
    }
}
