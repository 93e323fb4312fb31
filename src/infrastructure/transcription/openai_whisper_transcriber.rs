use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{
    AudioSource, TranscriptResult, Transcriber, TranscriptionError, TranscriptionOptions,
};
use crate::domain::{Utterance, WordTiming};

/// Whisper `audio/transcriptions` adapter using `verbose_json` for timings.
///
/// Whisper does not diarize: segments become speaker-less utterances.
pub struct OpenAiWhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    words: Vec<VerboseWord>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Deserialize)]
struct VerboseWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

impl OpenAiWhisperTranscriber {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiWhisperTranscriber {
    async fn transcribe(
        &self,
        source: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<TranscriptResult, TranscriptionError> {
        let AudioSource::Bytes { data, format } = source else {
            return Err(TranscriptionError::UnsupportedSource(
                "whisper needs the audio bytes, not a url".to_string(),
            ));
        };

        let file_part = multipart::Part::bytes(data.to_vec())
            .file_name(format!("audio.{}", format.extension()))
            .mime_str(format.as_mime())
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment")
            .part("file", file_part);
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }

        tracing::debug!(model = %self.model, bytes = data.len(), format = %format.as_str(), "Sending audio to Whisper");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscriptionError::Timeout(self.timeout)
                } else {
                    TranscriptionError::ApiRequestFailed(format!("request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let verbose: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            chars = verbose.text.len(),
            words = verbose.words.len(),
            segments = verbose.segments.len(),
            "Whisper transcription completed"
        );

        Ok(TranscriptResult {
            language: options
                .language
                .clone()
                .or(verbose.language)
                .unwrap_or_default(),
            text: verbose.text.trim().to_string(),
            words: verbose
                .words
                .into_iter()
                .map(|w| WordTiming {
                    word: w.word.trim().to_string(),
                    start_ms: seconds_to_ms(w.start),
                    end_ms: seconds_to_ms(w.end),
                })
                .collect(),
            utterances: verbose
                .segments
                .into_iter()
                .filter(|s| !s.text.trim().is_empty())
                .map(|s| Utterance {
                    speaker: None,
                    start_ms: seconds_to_ms(s.start),
                    end_ms: seconds_to_ms(s.end),
                    text: s.text.trim().to_string(),
                })
                .collect(),
        })
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}
