use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::ImportError;

/// Error response for the HTTP surface.
#[derive(Debug)]
pub enum ApiError {
    /// 4xx with a `{ "error": ... }` body.
    Client { status: StatusCode, message: String },
    /// 500 with `{ "error": "Internal server error", "details": ... }`.
    Internal { details: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Client {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Client {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn method_not_allowed() -> Self {
        ApiError::Client {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method not allowed".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Client { status, .. } => *status,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Unauthorized(msg) => ApiError::unauthorized(msg),
            err if err.is_client_error() => ApiError::bad_request(err.to_string()),
            err => {
                error!(error = %err, "Request failed");
                ApiError::Internal {
                    details: err.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Client { message, .. } => json!({ "error": message }),
            ApiError::Internal { details } => json!({
                "error": "Internal server error",
                "details": details,
            }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
