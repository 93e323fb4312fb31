use std::fmt;

use serde::Serialize;

use super::CallId;

/// Object-store key for a persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn for_recording(call_id: &CallId, extension: &str) -> Self {
        Self(format!("recordings/{}/audio.{}", call_id.as_uuid(), extension))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
