use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{CallId, CallStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    pub id: CallId,
    pub external_id: String,
    pub from_number: String,
    pub to_number: String,
    pub agent_id: String,
    pub duration_secs: Option<u32>,
    pub recording_url: Option<String>,
    pub status: CallStatus,
    pub consent: bool,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a call the first time its external id is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCall {
    pub external_id: String,
    pub from_number: String,
    pub to_number: String,
    pub agent_id: String,
    pub duration_secs: Option<u32>,
    pub recording_url: Option<String>,
    pub consent: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Call {
    pub fn new(new_call: NewCall) -> Self {
        let now = Utc::now();
        Self {
            id: CallId::new(),
            external_id: new_call.external_id,
            from_number: new_call.from_number,
            to_number: new_call.to_number,
            agent_id: new_call.agent_id,
            duration_secs: new_call.duration_secs,
            recording_url: new_call.recording_url,
            status: CallStatus::Received,
            consent: new_call.consent,
            occurred_at: new_call.occurred_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Free-text match over phone numbers, agent id and external id.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            &self.from_number,
            &self.to_number,
            &self.agent_id,
            &self.external_id,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Keeps the last four digits of a phone number for logging.
pub fn mask_phone_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}
