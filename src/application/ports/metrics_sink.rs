use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One router attempt against one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterCallRecord {
    pub provider: String,
    pub model: String,
    pub ok: bool,
    pub attempt: u32,
    pub latency_ms: u64,
    pub retriable: Option<bool>,
    pub error: Option<String>,
    pub estimated_cost: f64,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_batch(&self, records: &[RouterCallRecord]) -> Result<(), MetricsSinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsSinkError {
    #[error("write failed: {0}")]
    WriteFailed(String),
}
