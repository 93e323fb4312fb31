use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::segmenter::segment_transcript;
use super::CrmPushService;
use crate::application::ports::{
    AudioSource, CallAnalyzer, CallRepository, JobQueue, QueueError, RecordingFetcher,
    RepositoryError, Storage, Transcriber, TranscriptionOptions,
};
use crate::domain::{
    AudioFormat, Call, CallId, CallJob, CallStatus, Insights, Recording, Scorecard,
    ScorecardTemplate, StorageKey, Transcript,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub language: String,
    pub locale: String,
    pub diarize: bool,
    pub scorecard_template: ScorecardTemplate,
    pub fetch_timeout: Duration,
    pub transcription_timeout: Duration,
    pub analysis_timeout: Duration,
    pub crm_auto_push: bool,
    /// Sleep between claims when the queue is empty.
    pub poll_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("call not found for external id {0}")]
    CallNotFound(String),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// How a job was settled with the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Processed(CallId),
    /// Failed permanently; the call could not be resolved.
    Abandoned(String),
    /// Handed back for redelivery.
    Redeliver(String),
}

/// Consumes call jobs and runs the processing pipeline for each.
pub struct CallProcessingWorker {
    calls: Arc<dyn CallRepository>,
    queue: Arc<dyn JobQueue>,
    fetcher: Arc<dyn RecordingFetcher>,
    storage: Arc<dyn Storage>,
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn CallAnalyzer>,
    crm: Option<Arc<CrmPushService>>,
    config: PipelineConfig,
}

impl CallProcessingWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calls: Arc<dyn CallRepository>,
        queue: Arc<dyn JobQueue>,
        fetcher: Arc<dyn RecordingFetcher>,
        storage: Arc<dyn Storage>,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn CallAnalyzer>,
        crm: Option<Arc<CrmPushService>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            calls,
            queue,
            fetcher,
            storage,
            transcriber,
            analyzer,
            crm,
            config,
        }
    }

    /// Claims and processes jobs until `shutdown` fires. A job in flight is
    /// always finished before the loop exits.
    pub async fn run(self: Arc<Self>, worker_index: usize, shutdown: CancellationToken) {
        tracing::info!(worker = worker_index, "Call processing worker started");

        while !shutdown.is_cancelled() {
            match self.queue.claim().await {
                Ok(Some(job)) => {
                    self.handle_job(job).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(worker = worker_index, error = %e, "Failed to claim job");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(worker = worker_index, "Call processing worker stopped");
    }

    /// Processes one claimed job and settles it with the queue.
    pub async fn handle_job(&self, job: CallJob) -> JobOutcome {
        let span = tracing::info_span!(
            "call_job",
            job_id = %job.id.as_uuid(),
            external_id = %job.external_call_id,
            attempt = job.attempts,
            reprocess = job.is_reprocess(),
        );

        async {
            let outcome = match self.process_job(&job).await {
                Ok(call_id) => JobOutcome::Processed(call_id),
                Err(WorkerError::CallNotFound(external_id)) => {
                    JobOutcome::Abandoned(format!("call not found for external id {}", external_id))
                }
                Err(e) => JobOutcome::Redeliver(e.to_string()),
            };

            let settled: Result<(), QueueError> = match &outcome {
                JobOutcome::Processed(_) => self.queue.complete(job.id).await,
                JobOutcome::Abandoned(message) => {
                    tracing::error!(error = %message, "Dropping job for unknown call");
                    self.queue.fail(job.id, message).await
                }
                JobOutcome::Redeliver(message) => {
                    tracing::error!(error = %message, "Call processing failed, handing job back");
                    self.queue.retry(job.id, message).await
                }
            };
            if let Err(e) = settled {
                tracing::error!(error = %e, "Failed to settle job with the queue");
            }
            outcome
        }
        .instrument(span)
        .await
    }

    pub async fn process_job(&self, job: &CallJob) -> Result<CallId, WorkerError> {
        let call = self
            .calls
            .get_by_external_id(&job.external_call_id)
            .await?
            .ok_or_else(|| WorkerError::CallNotFound(job.external_call_id.clone()))?;

        self.begin_processing(&call, job.is_reprocess()).await?;

        match self.run_pipeline(&call, job).await {
            Ok(()) => {
                self.calls
                    .update_status(call.id, CallStatus::Processed)
                    .await?;
                tracing::info!(call_id = %call.id, "Call processed");
                Ok(call.id)
            }
            Err(e) => {
                if let Err(mark_err) = self.calls.update_status(call.id, CallStatus::Failed).await {
                    tracing::warn!(call_id = %call.id, error = %mark_err, "Failed to mark call as failed");
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, call: &Call, job: &CallJob) -> Result<(), WorkerError> {
        let audio = self.fetch_and_store(call, job).await?;

        let transcript = self.transcribe(call, audio).await;
        self.calls.upsert_transcript(&transcript).await?;

        let segments = segment_transcript(&transcript);
        self.calls.replace_segments(call.id, &segments).await?;
        tracing::debug!(segments = segments.len(), "Transcript segmented");

        let insights = self.extract_insights(&transcript).await;
        self.calls.upsert_insights(&insights).await?;

        let scorecard = self.score(&transcript).await;
        self.calls.upsert_scorecard(&scorecard).await?;

        if self.config.crm_auto_push {
            if let Some(crm) = &self.crm {
                if let Err(e) = crm.push(call.id).await {
                    tracing::warn!(error = %e, "CRM auto-push could not be recorded");
                }
            }
        }
        Ok(())
    }

    /// Downloads and stores the recording. Anything short of a repository
    /// failure degrades to processing without a stored recording.
    async fn fetch_and_store(&self, call: &Call, job: &CallJob) -> Result<Option<AudioSource>, WorkerError> {
        let Some(url) = recording_url(call, job) else {
            tracing::debug!("No recording url, skipping fetch");
            return Ok(None);
        };

        let fetched = match tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(&url)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Recording fetch failed, continuing without audio");
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.config.fetch_timeout.as_millis() as u64, "Recording fetch timed out, continuing without audio");
                return Ok(None);
            }
        };

        // Untyped downloads are assumed to be MP3.
        let format = fetched
            .content_type
            .as_deref()
            .and_then(AudioFormat::from_mime)
            .or_else(|| AudioFormat::from_url(&url))
            .unwrap_or(AudioFormat::Mp3);
        let key = StorageKey::for_recording(&call.id, format.extension());

        match self.storage.put(&key, fetched.data.clone(), format.as_mime()).await {
            Ok(stored) => {
                let recording = Recording {
                    call_id: call.id,
                    storage_key: stored.key,
                    source_url: url.clone(),
                    format,
                    size_bytes: stored.size_bytes,
                    created_at: chrono::Utc::now(),
                };
                self.calls.upsert_recording(&recording).await?;
                tracing::debug!(key = %recording.storage_key, bytes = recording.size_bytes, "Recording stored");
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to store recording, transcribing from memory");
            }
        }

        Ok(Some(AudioSource::Bytes {
            data: fetched.data,
            format,
        }))
    }

    async fn transcribe(&self, call: &Call, audio: Option<AudioSource>) -> Transcript {
        let Some(source) = audio else {
            return Transcript::empty(call.id, self.config.language.clone());
        };

        let options = TranscriptionOptions {
            diarize: self.config.diarize,
            language: Some(self.config.language.clone()),
        };
        match tokio::time::timeout(
            self.config.transcription_timeout,
            self.transcriber.transcribe(&source, &options),
        )
        .await
        {
            Ok(Ok(result)) => {
                let language = if result.language.trim().is_empty() {
                    self.config.language.clone()
                } else {
                    result.language
                };
                Transcript::new(call.id, language, result.text, result.words, result.utterances)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Transcription failed, storing empty transcript");
                Transcript::empty(call.id, self.config.language.clone())
            }
            Err(_) => {
                tracing::warn!("Transcription timed out, storing empty transcript");
                Transcript::empty(call.id, self.config.language.clone())
            }
        }
    }

    async fn extract_insights(&self, transcript: &Transcript) -> Insights {
        if transcript.is_empty() {
            return Insights::empty(transcript.call_id);
        }
        match tokio::time::timeout(
            self.config.analysis_timeout,
            self.analyzer.extract_insights(transcript, &self.config.locale),
        )
        .await
        {
            Ok(Ok(insights)) => insights,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Insight extraction failed, storing empty insights");
                Insights::empty(transcript.call_id)
            }
            Err(_) => {
                tracing::warn!("Insight extraction timed out, storing empty insights");
                Insights::empty(transcript.call_id)
            }
        }
    }

    async fn score(&self, transcript: &Transcript) -> Scorecard {
        let template = &self.config.scorecard_template;
        if transcript.is_empty() {
            return Scorecard::empty(transcript.call_id, template.key.clone());
        }
        match tokio::time::timeout(
            self.config.analysis_timeout,
            self.analyzer.score_call(transcript, template, &self.config.locale),
        )
        .await
        {
            Ok(Ok(scorecard)) => scorecard,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Scoring failed, storing empty scorecard");
                Scorecard::empty(transcript.call_id, template.key.clone())
            }
            Err(_) => {
                tracing::warn!("Scoring timed out, storing empty scorecard");
                Scorecard::empty(transcript.call_id, template.key.clone())
            }
        }
    }

    async fn begin_processing(&self, call: &Call, reprocess: bool) -> Result<(), WorkerError> {
        if reprocess {
            tracing::info!(call_id = %call.id, from = %call.status, "Reprocessing call");
        } else if !call.status.can_transition_to(CallStatus::Processing) {
            tracing::warn!(
                call_id = %call.id,
                from = %call.status,
                "Re-running a processed call for a duplicate delivery"
            );
        }
        self.calls
            .update_status(call.id, CallStatus::Processing)
            .await?;
        Ok(())
    }
}

/// A newer webhook may carry the recording url the stored call lacks.
fn recording_url(call: &Call, job: &CallJob) -> Option<String> {
    job.payload
        .get("recording_url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .or_else(|| call.recording_url.clone())
}
