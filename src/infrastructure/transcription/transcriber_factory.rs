use std::sync::Arc;
use std::time::Duration;

use super::{DisabledTranscriber, OpenAiWhisperTranscriber};
use crate::application::ports::{Transcriber, TranscriptionError};
use crate::presentation::config::{TranscriptionProvider, TranscriptionSettings};

pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create(
        client: reqwest::Client,
        settings: &TranscriptionSettings,
    ) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
        match settings.provider {
            TranscriptionProvider::Disabled => {
                tracing::warn!("Transcription disabled; calls will get empty transcripts");
                Ok(Arc::new(DisabledTranscriber))
            }
            TranscriptionProvider::OpenAi => {
                if settings.api_key.is_empty() {
                    return Err(TranscriptionError::TranscriptionFailed(
                        "API key required for OpenAI Whisper".to_string(),
                    ));
                }
                tracing::info!(model = %settings.model, "Using OpenAI Whisper transcription");
                Ok(Arc::new(OpenAiWhisperTranscriber::new(
                    client,
                    settings.api_key.clone(),
                    settings.base_url.clone(),
                    settings.model.clone(),
                    Duration::from_secs(settings.timeout_secs),
                )))
            }
        }
    }
}
