use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CallId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub call_id: CallId,
    pub language: String,
    pub text: String,
    pub words: Vec<WordTiming>,
    pub utterances: Vec<Utterance>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A diarized span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Option<String>,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Transcript {
    pub fn new(
        call_id: CallId,
        language: String,
        text: String,
        words: Vec<WordTiming>,
        utterances: Vec<Utterance>,
    ) -> Self {
        Self {
            call_id,
            language,
            text,
            words,
            utterances,
            updated_at: Utc::now(),
        }
    }

    pub fn empty(call_id: CallId, language: impl Into<String>) -> Self {
        Self::new(call_id, language.into(), String::new(), Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
