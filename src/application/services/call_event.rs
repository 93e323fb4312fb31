use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::domain::NewCall;

/// Telephony webhook body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallEvent {
    pub event: String,
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub agent_id: String,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub consent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventValidationError {
    #[error("malformed body: {0}")]
    Malformed(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("negative duration: {0}")]
    NegativeDuration(i64),
    #[error("duration out of range: {0}")]
    DurationOutOfRange(i64),
    #[error("recording url must be http(s): {0}")]
    InvalidRecordingUrl(String),
}

impl CallEvent {
    pub fn parse(body: &[u8]) -> Result<Self, EventValidationError> {
        let event: CallEvent = serde_json::from_slice(body)
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), EventValidationError> {
        for (name, value) in [
            ("event", &self.event),
            ("call_id", &self.call_id),
            ("from", &self.from),
            ("to", &self.to),
            ("agent_id", &self.agent_id),
        ] {
            if value.trim().is_empty() {
                return Err(EventValidationError::MissingField(name));
            }
        }

        if let Some(duration) = self.duration {
            if duration < 0 {
                return Err(EventValidationError::NegativeDuration(duration));
            }
            if u32::try_from(duration).is_err() {
                return Err(EventValidationError::DurationOutOfRange(duration));
            }
        }

        if let Some(url) = self.recording_url.as_deref().map(str::trim) {
            let lower = url.to_ascii_lowercase();
            let has_host = lower
                .strip_prefix("https://")
                .or_else(|| lower.strip_prefix("http://"))
                .is_some_and(|rest| !rest.is_empty());
            if !has_host {
                return Err(EventValidationError::InvalidRecordingUrl(url.to_string()));
            }
        }
        Ok(())
    }

    pub fn to_new_call(&self) -> NewCall {
        NewCall {
            external_id: self.call_id.trim().to_string(),
            from_number: self.from.trim().to_string(),
            to_number: self.to.trim().to_string(),
            agent_id: self.agent_id.trim().to_string(),
            duration_secs: self.duration.and_then(|d| u32::try_from(d).ok()),
            recording_url: self
                .recording_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            consent: self.consent.unwrap_or(false),
            occurred_at: self.timestamp,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

/// Accepts RFC 3339 strings or Unix epochs in seconds or milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    const MILLIS_THRESHOLD: i64 = 100_000_000_000;

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        RawTimestamp::Epoch(value) => {
            let parsed = if value.abs() >= MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(value).single()
            } else {
                Utc.timestamp_opt(value, 0).single()
            };
            parsed.ok_or_else(|| serde::de::Error::custom(format!("invalid epoch timestamp: {}", value)))
        }
    }
}
