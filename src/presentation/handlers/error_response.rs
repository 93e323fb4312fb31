use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::application::services::QueryError;
use crate::domain::CallId;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn parse_call_id(raw: &str) -> Result<CallId, Response> {
    Uuid::parse_str(raw)
        .map(CallId::from_uuid)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("Invalid call ID: {}", raw)))
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match &self {
            QueryError::NotFound(id) => {
                error_response(StatusCode::NOT_FOUND, format!("Call not found: {}", id))
            }
            QueryError::FeatureDisabled(feature) => {
                error_response(StatusCode::FORBIDDEN, format!("Feature disabled: {}", feature))
            }
            QueryError::Repository(_) | QueryError::Queue(_) => {
                tracing::error!(error = %self, "Call query failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
