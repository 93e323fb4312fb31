mod ai_router;
mod call_event;
mod call_processing_worker;
mod call_query_service;
mod crm_push;
mod embedding_cache;
mod generation_stream;
mod metrics_recorder;
mod provider_health;
mod routed_call_analyzer;
mod segmenter;
mod webhook_ingestion;
mod webhook_signature;

pub use ai_router::{AiRouter, GenError, GenResult, NO_PROVIDER_AVAILABLE, RouterConfig, RoutingMode};
pub use call_event::{CallEvent, EventValidationError};
pub use call_processing_worker::{CallProcessingWorker, JobOutcome, PipelineConfig, WorkerError};
pub use call_query_service::{CallQueryService, QueryError};
pub use crm_push::{CrmPushError, CrmPushService};
pub use embedding_cache::{
    CachedEmbedder, DEFAULT_CACHE_TTL, DEFAULT_MAX_LOCAL_ENTRIES, EmbeddingCache, cache_key,
};
pub use generation_stream::{GenerationStream, StreamEvent, StreamSummary};
pub use metrics_recorder::{DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL, MetricsRecorder};
pub use provider_health::{Circuit, CircuitSnapshot, ProviderHealth, ProviderMetrics};
pub use routed_call_analyzer::{
    DEFAULT_MAX_TRANSCRIPT_CHARS, RoutedCallAnalyzer, insights_schema, scoring_schema,
};
pub use segmenter::segment_transcript;
pub use webhook_ingestion::{DropReason, IngestOutcome, IngestionError, WebhookIngestionService};
pub use webhook_signature::WebhookVerifier;
