use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::ai_router::{GenError, attempt_record};
use super::{MetricsRecorder, ProviderHealth};
use crate::application::ports::{LlmProvider, ProviderError, TextChunkStream};

pub(crate) const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSummary {
    pub provider: String,
    pub model: String,
    pub chars: usize,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk(String),
    Done(StreamSummary),
    Failed(GenError),
}

/// Consumer end of a routed stream. Dropping it, or calling `cancel`, stops
/// the producer at its next chunk.
pub struct GenerationStream {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl GenerationStream {
    pub(crate) fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    pub fn cancel(&mut self) {
        self.receiver.close();
    }

    /// Drains the stream into one string.
    pub async fn collect_text(mut self) -> Result<(String, StreamSummary), GenError> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Chunk(chunk) => text.push_str(&chunk),
                StreamEvent::Done(summary) => return Ok((text, summary)),
                StreamEvent::Failed(error) => return Err(error),
            }
        }
        Err(GenError {
            message: "stream ended without completion".to_string(),
            retriable: true,
        })
    }
}

pub(crate) struct StreamProducer {
    pub provider: Arc<dyn LlmProvider>,
    pub health: Arc<ProviderHealth>,
    pub recorder: Option<Arc<MetricsRecorder>>,
    pub started: Instant,
    pub idle_timeout: Duration,
}

impl StreamProducer {
    pub async fn run(self, mut chunks: TextChunkStream, sender: mpsc::Sender<StreamEvent>) {
        let name = self.provider.name().to_string();
        let mut chars = 0usize;

        loop {
            let next = tokio::select! {
                _ = sender.closed() => {
                    tracing::debug!(provider = %name, "Stream consumer went away, stopping producer");
                    return;
                }
                next = tokio::time::timeout(self.idle_timeout, chunks.next()) => next,
            };

            match next {
                Ok(Some(Ok(chunk))) => {
                    chars += chunk.chars().count();
                    if sender.send(StreamEvent::Chunk(chunk)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    let latency = self.started.elapsed();
                    self.health.record_success(&name, latency);
                    self.record(latency, None).await;
                    let summary = StreamSummary {
                        provider: name.clone(),
                        model: self.provider.model().to_string(),
                        chars,
                        latency_ms: latency.as_millis() as u64,
                    };
                    let _ = sender.send(StreamEvent::Done(summary)).await;
                    return;
                }
                Ok(Some(Err(error))) => {
                    self.fail(&name, error, &sender).await;
                    return;
                }
                Err(_) => {
                    self.fail(&name, ProviderError::Timeout(self.idle_timeout), &sender)
                        .await;
                    return;
                }
            }
        }
    }

    async fn fail(&self, name: &str, error: ProviderError, sender: &mpsc::Sender<StreamEvent>) {
        let latency = self.started.elapsed();
        self.health.record_failure(name, latency);
        self.record(latency, Some(&error)).await;
        tracing::warn!(provider = name, error = %error, "Generation stream failed");
        let _ = sender
            .send(StreamEvent::Failed(GenError::from_provider(&error)))
            .await;
    }

    async fn record(&self, latency: Duration, error: Option<&ProviderError>) {
        if let Some(recorder) = &self.recorder {
            recorder
                .record(attempt_record(self.provider.as_ref(), 1, latency, error, None))
                .await;
        }
    }
}
