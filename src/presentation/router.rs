use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    call_webhook_handler, crm_push_handler, get_call_handler, health_handler, list_calls_handler,
    reprocess_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/webhooks/calls", post(call_webhook_handler))
        .route("/api/v1/calls", get(list_calls_handler))
        .route("/api/v1/calls/{call_id}", get(get_call_handler))
        .route("/api/v1/calls/{call_id}/crm-push", post(crm_push_handler))
        .route("/api/v1/calls/{call_id}/reprocess", post(reprocess_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
