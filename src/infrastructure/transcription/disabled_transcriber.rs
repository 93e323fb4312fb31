use async_trait::async_trait;

use crate::application::ports::{
    AudioSource, TranscriptResult, Transcriber, TranscriptionError, TranscriptionOptions,
};

/// Stands in when no transcription vendor is configured; the worker then
/// stores empty transcripts.
pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(
        &self,
        _source: &AudioSource,
        _options: &TranscriptionOptions,
    ) -> Result<TranscriptResult, TranscriptionError> {
        Err(TranscriptionError::TranscriptionFailed(
            "transcription is disabled".to_string(),
        ))
    }
}
