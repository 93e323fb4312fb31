use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::application::ports::{CallDetails, CallRepository, CrmClient, CrmPushOutcome, RepositoryError};
use crate::domain::{CallId, CrmEvent};

#[derive(Debug, thiserror::Error)]
pub enum CrmPushError {
    #[error("call not found: {0}")]
    CallNotFound(CallId),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Pushes a call summary to the CRM and records the attempt as a `CrmEvent`.
pub struct CrmPushService {
    calls: Arc<dyn CallRepository>,
    client: Arc<dyn CrmClient>,
    timeout: Duration,
}

impl CrmPushService {
    pub fn new(calls: Arc<dyn CallRepository>, client: Arc<dyn CrmClient>, timeout: Duration) -> Self {
        Self {
            calls,
            client,
            timeout,
        }
    }

    /// Creates a pending event, pushes, then records `sent` or `error`.
    /// A CRM failure is recorded on the event, not returned.
    pub async fn push(&self, call_id: CallId) -> Result<CrmEvent, CrmPushError> {
        let details = self
            .calls
            .get_details(call_id)
            .await?
            .ok_or(CrmPushError::CallNotFound(call_id))?;

        let mut event = CrmEvent::pending(
            call_id,
            self.client.target().to_string(),
            crm_payload(&details),
        );
        self.calls.create_crm_event(&event).await?;

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.client.push_call(call_id, &event.payload),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => CrmPushOutcome::error(format!("timed out after {:?}", self.timeout)),
        };

        self.calls
            .update_crm_event(event.id, outcome.status, outcome.error_message.as_deref())
            .await?;

        match &outcome.error_message {
            Some(message) => tracing::warn!(call_id = %call_id, target = %event.target, error = %message, "CRM push failed"),
            None => tracing::info!(call_id = %call_id, target = %event.target, "CRM push sent"),
        }

        event.status = outcome.status;
        event.error_message = outcome.error_message;
        event.updated_at = chrono::Utc::now();
        Ok(event)
    }
}

fn crm_payload(details: &CallDetails) -> Value {
    let call = &details.call;
    json!({
        "call_id": call.id,
        "external_id": call.external_id,
        "agent_id": call.agent_id,
        "from": call.from_number,
        "to": call.to_number,
        "occurred_at": call.occurred_at,
        "duration_secs": call.duration_secs,
        "summary": details.insights.as_ref().map(|i| i.summary.clone()),
        "next_actions": details.insights.as_ref().map(|i| i.next_actions.clone()).unwrap_or_default(),
        "tags": details.insights.as_ref().map(|i| i.tags.clone()).unwrap_or_default(),
        "score": details.scorecard.as_ref().map(|s| s.total_score),
    })
}
