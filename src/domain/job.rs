use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// A durable unit of work asking the worker to process one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallJob {
    pub id: JobId,
    pub external_call_id: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallJob {
    pub fn new(external_call_id: String, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            external_call_id,
            payload,
            status: JobStatus::Queued,
            attempts: 0,
            error_message: None,
            available_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Job re-running the full pipeline for a call that may already be processed.
    pub fn reprocess(external_call_id: String) -> Self {
        let payload = serde_json::json!({ "call_id": external_call_id, "reprocess": true });
        Self::new(external_call_id, payload)
    }

    pub fn is_reprocess(&self) -> bool {
        self.payload
            .get("reprocess")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
