use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::services::IngestOutcome;
use crate::presentation::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Always answers `200 {"ok":true}`; ingestion failures only reach the logs.
#[tracing::instrument(skip_all, fields(body_bytes = body.len()))]
pub async fn call_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.ingestion_service.ingest(&body, signature).await {
        Ok(IngestOutcome::Accepted {
            call_id, created, ..
        }) => {
            tracing::debug!(call_id = %call_id, created, "Webhook accepted");
            (StatusCode::OK, Json(WebhookResponse { ok: true }))
        }
        Ok(IngestOutcome::Dropped(reason)) => {
            tracing::debug!(reason = ?reason, "Webhook dropped");
            (StatusCode::OK, Json(WebhookResponse { ok: true }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook ingestion failed");
            (StatusCode::OK, Json(WebhookResponse { ok: true }))
        }
    }
}
