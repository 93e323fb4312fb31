use std::sync::Arc;

use super::call_event::{CallEvent, EventValidationError};
use super::webhook_signature::WebhookVerifier;
use crate::application::ports::{CallRepository, JobQueue, QueueError, RepositoryError};
use crate::domain::{CallId, CallJob, JobId, mask_phone_number};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        call_id: CallId,
        job_id: JobId,
        created: bool,
    },
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    InvalidSignature,
    InvalidPayload(EventValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("enqueue failed: {0}")]
    Enqueue(#[from] QueueError),
}

/// Authenticates telephony webhooks, records the call once and queues it for
/// processing.
pub struct WebhookIngestionService {
    verifier: WebhookVerifier,
    calls: Arc<dyn CallRepository>,
    queue: Arc<dyn JobQueue>,
}

impl WebhookIngestionService {
    pub fn new(
        verifier: WebhookVerifier,
        calls: Arc<dyn CallRepository>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            verifier,
            calls,
            queue,
        }
    }

    /// Unauthenticated or invalid events come back as `Dropped`; only a failure
    /// to persist or enqueue an authenticated event is an error.
    pub async fn ingest(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestOutcome, IngestionError> {
        if !self.verifier.verify(body, signature) {
            tracing::warn!(body_bytes = body.len(), "Dropping webhook with invalid signature");
            return Ok(IngestOutcome::Dropped(DropReason::InvalidSignature));
        }

        let event = match CallEvent::parse(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping invalid webhook payload");
                return Ok(IngestOutcome::Dropped(DropReason::InvalidPayload(e)));
            }
        };

        let new_call = event.to_new_call();
        let (call, created) = self.calls.find_or_create(&new_call).await?;

        let payload = serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);
        let job = CallJob::new(call.external_id.clone(), payload);
        self.queue.enqueue(&job).await?;

        tracing::info!(
            call_id = %call.id,
            external_id = %call.external_id,
            event = %event.event,
            from = %mask_phone_number(&call.from_number),
            created,
            job_id = %job.id.as_uuid(),
            "Webhook accepted"
        );

        Ok(IngestOutcome::Accepted {
            call_id: call.id,
            job_id: job.id,
            created,
        })
    }
}
