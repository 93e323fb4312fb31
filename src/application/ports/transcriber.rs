use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{AudioFormat, Utterance, WordTiming};

/// Where the audio to transcribe comes from.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Url(String),
    Bytes { data: Bytes, format: AudioFormat },
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptionOptions {
    pub diarize: bool,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptResult {
    pub language: String,
    pub text: String,
    pub words: Vec<WordTiming>,
    pub utterances: Vec<Utterance>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        source: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<TranscriptResult, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("unsupported audio source: {0}")]
    UnsupportedSource(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
