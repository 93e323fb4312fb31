use async_trait::async_trait;

use crate::domain::{CallJob, JobId};

/// Durable queue of call-processing jobs.
///
/// A claimed job is invisible to other consumers until it is completed,
/// failed, handed back with `retry`, or its visibility timeout lapses.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &CallJob) -> Result<(), QueueError>;

    async fn claim(&self) -> Result<Option<CallJob>, QueueError>;

    async fn complete(&self, id: JobId) -> Result<(), QueueError>;

    /// Hands the job back for redelivery, or fails it once attempts are exhausted.
    async fn retry(&self, id: JobId, error_message: &str) -> Result<(), QueueError>;

    /// Fails the job permanently without redelivery.
    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("job not found: {0}")]
    NotFound(String),
}
