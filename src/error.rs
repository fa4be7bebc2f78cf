use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::csrf::{IssueError, StoreError};

/// The primary error type for the application.
///
/// Every rejection produced by the request pipeline or a handler ends up here,
/// so clients always receive the same structured JSON body and never see
/// internal detail such as raw store errors or expected token values.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For when a request conflicts with the current state of the server.
    Conflict(String),
    /// For when a request requires an authenticated principal.
    Unauthorized(String),
    /// For when the request origin is not in the CORS allow-list.
    OriginNotAllowed(String),
    /// A state-changing request arrived without any CSRF token.
    CsrfTokenMissing,
    /// A CSRF token was supplied but does not match the live token of the session.
    CsrfTokenMismatch,
    /// The CSRF token store could not be reached.
    StoreUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
    /// The request body exceeds the configured limit.
    PayloadTooLarge {
        /// Maximum accepted body size in bytes.
        limit: usize,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::OriginNotAllowed(origin) => write!(f, "Origin not allowed: {}", origin),
            AppError::CsrfTokenMissing => write!(f, "CSRF token missing"),
            AppError::CsrfTokenMismatch => write!(f, "CSRF token mismatch"),
            AppError::StoreUnavailable(msg) => write!(f, "Token store unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::PayloadTooLarge { limit } => {
                write!(f, "Payload exceeds {} bytes", limit)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::StoreUnavailable(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_) | AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::OriginNotAllowed(_) | AppError::CsrfTokenMissing | AppError::CsrfTokenMismatch => {
                StatusCode::FORBIDDEN
            }
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

/// Logs the internal detail under a fresh error id and returns the id as the
/// only detail the client gets to see.
fn opaque_internal(kind: &str, detail: &dyn fmt::Display) -> serde_json::Value {
    let error_id = uuid::Uuid::new_v4();
    tracing::error!(%error_id, "{}: {}", kind, detail);
    json!({ "error_id": error_id.to_string() })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, error_message, details) = match self {
            AppError::Internal(e) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                Some(opaque_internal("Internal error", &format!("{:?}", e))),
            ),
            AppError::StoreUnavailable(msg) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                Some(opaque_internal("Token store unavailable", &msg)),
            ),
            AppError::Database(msg) => (
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                Some(opaque_internal("Database error", &msg)),
            ),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::Conflict(msg) => ("CONFLICT", msg, None),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg, None),
            AppError::OriginNotAllowed(_) => {
                ("ORIGIN_NOT_ALLOWED", "Cross-origin request rejected".to_string(), None)
            }
            AppError::CsrfTokenMissing => (
                "CSRF_TOKEN_MISSING",
                "CSRF token required. Fetch one from /api/csrf/token and send it in the X-XSRF-TOKEN or X-CSRF-TOKEN header".to_string(),
                None,
            ),
            AppError::CsrfTokenMismatch => {
                ("CSRF_TOKEN_INVALID", "CSRF token is invalid or expired".to_string(), None)
            }
            AppError::ValidationError { field, message } => (
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::PayloadTooLarge { limit } => (
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds maximum size of {} bytes", limit),
                None,
            ),
        };

        let mut body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<IssueError> for AppError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Store(e) => e.into(),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Resource already exists".to_string())
            }
            sqlx::Error::Database(db_err) => AppError::Database(db_err.message().to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
