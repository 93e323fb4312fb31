use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
    pub embeddings: &'static str,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let embeddings = if state.embedder.is_some() {
        "enabled"
    } else {
        "disabled"
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION"),
            embeddings,
        }),
    )
}
