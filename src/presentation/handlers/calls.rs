use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::error_response::parse_call_id;
use crate::application::ports::CallFilter;
use crate::presentation::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCallsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct ReprocessResponse {
    pub call_id: String,
    pub job_id: String,
}

#[tracing::instrument(skip(state))]
pub async fn list_calls_handler(
    State(state): State<AppState>,
    Query(params): Query<ListCallsParams>,
) -> Response {
    let filter = CallFilter::new(params.page, params.page_size, params.q);
    match state.query_service.list_calls(&filter).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(skip(state))]
pub async fn get_call_handler(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    let id = match parse_call_id(&call_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.query_service.get_call(id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(skip(state))]
pub async fn crm_push_handler(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    let id = match parse_call_id(&call_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.query_service.request_crm_push(id).await {
        Ok(event) => (StatusCode::OK, Json(event)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(skip(state))]
pub async fn reprocess_handler(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    let id = match parse_call_id(&call_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.query_service.reprocess(id).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(ReprocessResponse {
                call_id: id.to_string(),
                job_id: job_id.as_uuid().to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
