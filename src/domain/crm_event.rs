use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::CallId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrmEvent {
    pub id: Uuid,
    pub call_id: CallId,
    pub target: String,
    pub payload: serde_json::Value,
    pub status: CrmEventStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmEventStatus {
    Pending,
    Sent,
    Error,
}

impl CrmEvent {
    pub fn pending(call_id: CallId, target: String, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            call_id,
            target,
            payload,
            status: CrmEventStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl CrmEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrmEventStatus::Pending => "pending",
            CrmEventStatus::Sent => "sent",
            CrmEventStatus::Error => "error",
        }
    }
}

impl FromStr for CrmEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrmEventStatus::Pending),
            "sent" => Ok(CrmEventStatus::Sent),
            "error" => Ok(CrmEventStatus::Error),
            _ => Err(format!("Invalid CRM event status: {}", s)),
        }
    }
}

impl fmt::Display for CrmEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
