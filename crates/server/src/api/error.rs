//! Mapping from dispatch errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use guichet_core::DispatchError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Error wrapper for API handlers
#[derive(Debug)]
pub struct ApiError(pub DispatchError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::NotScheduled { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::InvalidTransition { .. } => StatusCode::CONFLICT,
            DispatchError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind: self.0.kind().to_string(),
            }),
        )
            .into_response()
    }
}
