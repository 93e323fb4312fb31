mod calls;
mod error_response;
mod health;
mod webhook;

pub use calls::{
    ListCallsParams, ReprocessResponse, crm_push_handler, get_call_handler, list_calls_handler,
    reprocess_handler,
};
pub use error_response::ErrorResponse;
pub use health::health_handler;
pub use webhook::{SIGNATURE_HEADER, WebhookResponse, call_webhook_handler};
