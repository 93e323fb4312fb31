mod call_analyzer;
mod call_details;
mod call_filter;
mod call_repository;
mod crm_client;
mod embedder;
mod job_queue;
mod llm_provider;
mod metrics_sink;
mod recording_fetcher;
mod repository_error;
mod resilient_json;
mod shared_cache_tier;
mod storage;
mod transcriber;

pub use call_analyzer::{AnalysisError, CallAnalyzer};
pub use call_details::CallDetails;
pub use call_filter::{CallFilter, CallPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use call_repository::CallRepository;
pub use crm_client::{CrmClient, CrmPushOutcome};
pub use embedder::{Embedder, EmbedderError};
pub use job_queue::{JobQueue, QueueError};
pub use llm_provider::{
    GenerationOutput, GenerationRequest, JSON_MIME_TYPE, LlmProvider, ProviderError,
    TextChunkStream,
};
pub use metrics_sink::{MetricsSink, MetricsSinkError, RouterCallRecord};
pub use recording_fetcher::{FetchError, FetchedRecording, RecordingFetcher};
pub use repository_error::RepositoryError;
pub use resilient_json::extract_json;
pub use shared_cache_tier::{CacheError, SharedCacheTier};
pub use storage::{Storage, StorageError, StoredObject};
pub use transcriber::{
    AudioSource, TranscriptResult, Transcriber, TranscriptionError, TranscriptionOptions,
};
