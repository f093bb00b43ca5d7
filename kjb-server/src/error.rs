//! HTTP error mapping for the jukebox API

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kjb_common::{ErrorKind, JukeboxError};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Domain error raised by a jukebox operation
    #[error(transparent)]
    Jukebox(#[from] JukeboxError),

    /// Request body or query string could not be decoded (400)
    #[error("Malformed request: {0}")]
    Malformed(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Jukebox(e) => e.kind(),
            ApiError::Malformed(_) => ErrorKind::InvalidInput,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Jukebox(e) => e.code(),
            ApiError::Malformed(_) => "INVALID_INPUT",
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = Json(json!({
            "error": {
                "kind": kind,
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status_for(kind), body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
