//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type: an HTTP status plus the stable error code of the
/// underlying failure.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: u32,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        kiln_core::Error::InvalidInput(message.into()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}

fn status_for(err: &kiln_core::Error) -> StatusCode {
    use kiln_core::Error;
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        Error::InvalidSpec(_) => StatusCode::BAD_REQUEST,
        Error::WriteConflict(_) => StatusCode::CONFLICT,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::ExecutionFailed(_) => StatusCode::BAD_GATEWAY,
        Error::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<kiln_core::Error> for ApiError {
    fn from(err: kiln_core::Error) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<kiln_db::DbError> for ApiError {
    fn from(err: kiln_db::DbError) -> Self {
        kiln_core::Error::from(err).into()
    }
}
