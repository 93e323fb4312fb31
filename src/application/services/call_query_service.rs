use std::sync::Arc;

use super::{CrmPushError, CrmPushService};
use crate::application::ports::{
    CallDetails, CallFilter, CallPage, CallRepository, JobQueue, QueueError, RepositoryError,
};
use crate::domain::{CallId, CallJob, CrmEvent, JobId};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("call not found: {0}")]
    NotFound(CallId),
    #[error("feature disabled: {0}")]
    FeatureDisabled(&'static str),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl From<CrmPushError> for QueryError {
    fn from(error: CrmPushError) -> Self {
        match error {
            CrmPushError::CallNotFound(id) => QueryError::NotFound(id),
            CrmPushError::Repository(e) => QueryError::Repository(e),
        }
    }
}

/// Read side of the HTTP API, plus the explicit actions it exposes.
pub struct CallQueryService {
    calls: Arc<dyn CallRepository>,
    queue: Arc<dyn JobQueue>,
    crm: Option<Arc<CrmPushService>>,
}

impl CallQueryService {
    /// `crm` is `None` when manual CRM push is switched off.
    pub fn new(
        calls: Arc<dyn CallRepository>,
        queue: Arc<dyn JobQueue>,
        crm: Option<Arc<CrmPushService>>,
    ) -> Self {
        Self { calls, queue, crm }
    }

    pub async fn list_calls(&self, filter: &CallFilter) -> Result<CallPage, QueryError> {
        Ok(self.calls.list(filter).await?)
    }

    pub async fn get_call(&self, id: CallId) -> Result<CallDetails, QueryError> {
        self.calls
            .get_details(id)
            .await?
            .ok_or(QueryError::NotFound(id))
    }

    pub async fn request_crm_push(&self, id: CallId) -> Result<CrmEvent, QueryError> {
        let crm = self.crm.as_ref().ok_or(QueryError::FeatureDisabled("crm_push"))?;
        Ok(crm.push(id).await?)
    }

    /// Queues the call for another full pipeline run.
    pub async fn reprocess(&self, id: CallId) -> Result<JobId, QueryError> {
        let call = self
            .calls
            .get_by_id(id)
            .await?
            .ok_or(QueryError::NotFound(id))?;

        let job = CallJob::reprocess(call.external_id.clone());
        self.queue.enqueue(&job).await?;
        tracing::info!(call_id = %call.id, job_id = %job.id.as_uuid(), "Call queued for reprocessing");
        Ok(job.id)
    }
}
