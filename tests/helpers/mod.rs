#![allow(dead_code)]

mod test_postgres;

pub use test_postgres::TestPostgres;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use callwise::application::ports::{
    AnalysisError, AudioSource, CacheError, CallAnalyzer, CrmClient, CrmPushOutcome, Embedder,
    EmbedderError, FetchError, FetchedRecording, GenerationOutput, GenerationRequest, JobQueue,
    LlmProvider, MetricsSink, MetricsSinkError, ProviderError, QueueError, RecordingFetcher,
    RouterCallRecord, SharedCacheTier, Storage, StorageError, StoredObject, TranscriptResult,
    Transcriber, TranscriptionError, TranscriptionOptions,
};
use callwise::application::services::WebhookVerifier;
use callwise::domain::{
    CallId, CallJob, Embedding, Insights, InsightsDraft, JobId, NewCall, RawItemScore, Scorecard,
    ScorecardTemplate, StorageKey, TemplateItem, Transcript, Utterance,
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub fn verifier() -> WebhookVerifier {
    WebhookVerifier::new(WEBHOOK_SECRET.as_bytes()).expect("hmac accepts any key length")
}

pub fn call_event_body(call_id: &str) -> Vec<u8> {
    serde_json::json!({
        "event": "call.completed",
        "call_id": call_id,
        "from": "+15551234567",
        "to": "+15557654321",
        "agent_id": "agent-7",
        "duration": 184,
        "recording_url": format!("https://recordings.example.com/{}.mp3", call_id),
        "timestamp": "2026-03-01T10:15:00Z",
        "consent": true
    })
    .to_string()
    .into_bytes()
}

pub fn new_call(external_id: &str) -> NewCall {
    NewCall {
        external_id: external_id.to_string(),
        from_number: "+15551234567".to_string(),
        to_number: "+15557654321".to_string(),
        agent_id: "agent-7".to_string(),
        duration_secs: Some(184),
        recording_url: Some(format!("https://recordings.example.com/{}.mp3", external_id)),
        consent: true,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap(),
    }
}

pub fn scorecard_template() -> ScorecardTemplate {
    ScorecardTemplate {
        key: "sales-v1".to_string(),
        items: vec![
            TemplateItem {
                key: "rapport".to_string(),
                label: "Rapport".to_string(),
                description: "Builds rapport early".to_string(),
                weight: 1.0,
            },
            TemplateItem {
                key: "discovery".to_string(),
                label: "Discovery".to_string(),
                description: "Asks about needs".to_string(),
                weight: 2.0,
            },
        ],
    }
}

pub fn text_output(text: &str) -> GenerationOutput {
    GenerationOutput {
        text: text.to_string(),
        json: None,
        model: "test-model".to_string(),
        input_tokens: Some(10),
        output_tokens: Some(5),
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::Server {
        status: 500,
        body: "internal error".to_string(),
    }
}

/// Provider that replays scripted results, then repeats `fallback` forever.
pub struct ScriptedProvider {
    name: String,
    cost_per_token: f64,
    script: Mutex<VecDeque<Result<GenerationOutput, ProviderError>>>,
    fallback: Result<GenerationOutput, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicU32,
    stream_chunks: Option<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, cost_per_token: f64) -> Self {
        Self {
            name: name.to_string(),
            cost_per_token,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(text_output(&format!("answer from {}", name))),
            delay: None,
            calls: AtomicU32::new(0),
            stream_chunks: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, result: Result<GenerationOutput, ProviderError>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn always(mut self, result: Result<GenerationOutput, ProviderError>) -> Self {
        self.fallback = result;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn streaming(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = Some(chunks.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "test-model"
    }

    fn cost_per_token(&self) -> f64 {
        self.cost_per_token
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<callwise::application::ports::TextChunkStream, ProviderError> {
        match &self.stream_chunks {
            Some(chunks) => {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let items: Vec<Result<String, ProviderError>> =
                    chunks.iter().cloned().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            None => {
                let output = self.generate(request).await?;
                Ok(Box::pin(futures::stream::once(async move { Ok(output.text) })))
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<RouterCallRecord>>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<RouterCallRecord> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn write_batch(&self, records: &[RouterCallRecord]) -> Result<(), MetricsSinkError> {
        if self.fail {
            return Err(MetricsSinkError::WriteFailed("sink offline".to_string()));
        }
        self.batches.lock().push(records.to_vec());
        Ok(())
    }
}

pub fn router_record(provider: &str, ok: bool) -> RouterCallRecord {
    RouterCallRecord {
        provider: provider.to_string(),
        model: "test-model".to_string(),
        ok,
        attempt: 1,
        latency_ms: 12,
        retriable: if ok { None } else { Some(true) },
        error: if ok { None } else { Some("boom".to_string()) },
        estimated_cost: 0.001,
        recorded_at: Utc::now(),
    }
}

pub struct StubFetcher {
    result: Result<FetchedRecording, FetchError>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn returning(data: &'static [u8], content_type: Option<&str>) -> Self {
        Self {
            result: Ok(FetchedRecording {
                data: Bytes::from_static(data),
                content_type: content_type.map(str::to_string),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(FetchError::UnexpectedStatus {
                status: 404,
                url: "https://recordings.example.com/missing.mp3".to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordingFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedRecording, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(recording) => Ok(recording.clone()),
            Err(FetchError::UnexpectedStatus { status, url }) => Err(FetchError::UnexpectedStatus {
                status: *status,
                url: url.clone(),
            }),
            Err(e) => Err(FetchError::RequestFailed(e.to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Bytes>>,
    pub fail: bool,
}

impl MemoryStorage {
    pub fn failing() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &StorageKey, data: Bytes, _content_type: &str) -> Result<StoredObject, StorageError> {
        if self.fail {
            return Err(StorageError::UploadFailed("bucket unavailable".to_string()));
        }
        let size_bytes = data.len() as u64;
        self.objects.lock().insert(key.as_str().to_string(), data);
        Ok(StoredObject {
            key: key.clone(),
            size_bytes,
        })
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.objects.lock().remove(key.as_str());
        Ok(())
    }
}

pub struct StubTranscriber {
    result: Result<TranscriptResult, String>,
    pub calls: AtomicUsize,
}

impl StubTranscriber {
    pub fn returning(text: &str) -> Self {
        Self {
            result: Ok(TranscriptResult {
                language: "en".to_string(),
                text: text.to_string(),
                words: Vec::new(),
                utterances: Vec::new(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_utterances(utterances: Vec<Utterance>) -> Self {
        let text = utterances
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            result: Ok(TranscriptResult {
                language: "en".to_string(),
                text,
                words: Vec::new(),
                utterances,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err("engine crashed".to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        _source: &AudioSource,
        _options: &TranscriptionOptions,
    ) -> Result<TranscriptResult, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(TranscriptionError::TranscriptionFailed)
    }
}

pub struct StubAnalyzer {
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn error() -> AnalysisError {
        AnalysisError::Generation {
            provider: "none".to_string(),
            message: "no_provider_available".to_string(),
            retriable: true,
        }
    }
}

#[async_trait]
impl CallAnalyzer for StubAnalyzer {
    async fn extract_insights(&self, transcript: &Transcript, _locale: &str) -> Result<Insights, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::error());
        }
        Ok(Insights::from_draft(
            transcript.call_id,
            InsightsDraft {
                summary: "Customer asked about pricing".to_string(),
                pain_points: vec!["budget".to_string()],
                objections: vec!["too expensive".to_string()],
                next_actions: vec!["send proposal".to_string()],
                tags: vec!["pricing".to_string()],
            },
        ))
    }

    async fn score_call(
        &self,
        transcript: &Transcript,
        template: &ScorecardTemplate,
        _locale: &str,
    ) -> Result<Scorecard, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::error());
        }
        let raw: Vec<RawItemScore> = template
            .items
            .iter()
            .map(|item| RawItemScore {
                key: item.key.clone(),
                score: 8.0,
            })
            .collect();
        Ok(Scorecard::from_scores(transcript.call_id, template, &raw))
    }
}

pub struct StubCrmClient {
    outcome: CrmPushOutcome,
    pub pushed: Mutex<Vec<(CallId, serde_json::Value)>>,
}

impl StubCrmClient {
    pub fn sending() -> Self {
        Self {
            outcome: CrmPushOutcome::sent(),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            outcome: CrmPushOutcome::error(message),
            pushed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CrmClient for StubCrmClient {
    fn target(&self) -> &str {
        "test-crm"
    }

    async fn push_call(&self, call_id: CallId, payload: &serde_json::Value) -> CrmPushOutcome {
        self.pushed.lock().push((call_id, payload.clone()));
        self.outcome.clone()
    }
}

/// Shared tier backed by a map; `fail` makes every command error.
#[derive(Default)]
pub struct MapCacheTier {
    pub values: Mutex<HashMap<String, String>>,
    pub fail: bool,
    pub gets: AtomicUsize,
}

impl MapCacheTier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SharedCacheTier for MapCacheTier {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        if self.fail {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Embedder producing `[len, 1.0]` per text and counting texts it embedded.
#[derive(Default)]
pub struct CountingEmbedder {
    pub embedded: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model(&self) -> &str {
        "test-embedding"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError> {
        self.embedded.fetch_add(1, Ordering::SeqCst);
        Ok(Embedding::new(vec![text.len() as f32, 1.0]))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedderError> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Embedding::new(vec![t.len() as f32, 1.0]))
            .collect())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

/// Queue whose broker is unreachable.
pub struct OfflineQueue;

#[async_trait]
impl JobQueue for OfflineQueue {
    async fn enqueue(&self, _job: &CallJob) -> Result<(), QueueError> {
        Err(QueueError::EnqueueFailed("queue offline".to_string()))
    }

    async fn claim(&self) -> Result<Option<CallJob>, QueueError> {
        Err(QueueError::ConnectionFailed("queue offline".to_string()))
    }

    async fn complete(&self, _id: JobId) -> Result<(), QueueError> {
        Ok(())
    }

    async fn retry(&self, _id: JobId, _error_message: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn fail(&self, _id: JobId, _error_message: &str) -> Result<(), QueueError> {
        Ok(())
    }
}
