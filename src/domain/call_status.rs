use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Lifecycle of a call through the processing pipeline.
///
/// Transitions only move forward. `Failed` and a stalled `Processing` may
/// start over; a `Processed` call only returns to `Processing` through an
/// explicit reprocess job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Received => "received",
            CallStatus::Processing => "processing",
            CallStatus::Processed => "processed",
            CallStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        match (self, next) {
            (CallStatus::Processed, CallStatus::Processing) => false,
            (_, CallStatus::Processing) => true,
            (CallStatus::Processing, CallStatus::Processed | CallStatus::Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Processed | CallStatus::Failed)
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(CallStatus::Received),
            "processing" => Ok(CallStatus::Processing),
            "processed" => Ok(CallStatus::Processed),
            "failed" => Ok(CallStatus::Failed),
            _ => Err(format!("Invalid call status: {}", s)),
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
