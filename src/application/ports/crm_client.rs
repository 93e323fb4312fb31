use async_trait::async_trait;

use crate::domain::{CallId, CrmEventStatus};

/// Terminal result of a single CRM push. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct CrmPushOutcome {
    pub status: CrmEventStatus,
    pub error_message: Option<String>,
}

impl CrmPushOutcome {
    pub fn sent() -> Self {
        Self {
            status: CrmEventStatus::Sent,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CrmEventStatus::Error,
            error_message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Name of the downstream system, stored on each CRM event.
    fn target(&self) -> &str;

    async fn push_call(&self, call_id: CallId, payload: &serde_json::Value) -> CrmPushOutcome;
}
