//! Error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// API error type that can be converted to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
            Self::Internal(msg) => {
                tracing::error!("internal server error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", None)
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

impl From<outbox_core::StageError> for ApiError {
    fn from(err: outbox_core::StageError) -> Self {
        match err {
            outbox_core::StageError::Serialize(e) => {
                Self::BadRequest(format!("event payload does not serialize: {e}"))
            }
            outbox_core::StageError::Database(e) => Self::Internal(format!("database error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_without_details_omits_the_field() {
        let error = ErrorResponse {
            error: "Bad Request".to_string(),
            details: None,
        };

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("Bad Request"));
        assert!(!json.contains("details"));
    }
}
