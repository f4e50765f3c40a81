use crate::services::documents::DocError;
use crate::services::object_store::ObjectStoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for errors crossing the HTTP boundary.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// The single place where the service error taxonomy is translated into
/// transport statuses. Every `DocError` kind maps to exactly one status.
impl From<DocError> for AppError {
    fn from(err: DocError) -> Self {
        let status = match &err {
            DocError::NotFound => StatusCode::NOT_FOUND,
            DocError::NoAccess => StatusCode::FORBIDDEN,
            DocError::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DocError::Empty => StatusCode::BAD_REQUEST,
            DocError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DocError::ProjectLimitExceeded => StatusCode::CONFLICT,
            DocError::ObjectStore(_) => StatusCode::BAD_GATEWAY,
            DocError::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DocError::Io(_) => StatusCode::BAD_REQUEST,
        };
        // Backend detail is logged, never echoed to the client.
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            let message = match &err {
                DocError::ObjectStore(_) => "upstream storage failure",
                _ => "internal error",
            };
            return AppError::new(status, message);
        }
        AppError::new(status, err.to_string())
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        let status = match &err {
            ObjectStoreError::NotFound(_) => StatusCode::NOT_FOUND,
            ObjectStoreError::InvalidKey => StatusCode::BAD_REQUEST,
            ObjectStoreError::Io(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "object store failure");
            return AppError::new(status, "upstream storage failure");
        }
        AppError::new(status, err.to_string())
    }
}
