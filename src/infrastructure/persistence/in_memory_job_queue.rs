use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::QueuePolicy;
use crate::application::ports::{JobQueue, QueueError};
use crate::domain::{CallJob, JobId, JobStatus};

struct Entry {
    job: CallJob,
    locked_until: Option<DateTime<Utc>>,
}

/// Process-local job queue following the same claim and redelivery rules as
/// the Postgres queue.
pub struct InMemoryJobQueue {
    policy: QueuePolicy,
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryJobQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn jobs(&self) -> Vec<CallJob> {
        self.entries.lock().iter().map(|e| e.job.clone()).collect()
    }

    pub fn get(&self, id: JobId) -> Option<CallJob> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.job.id == id)
            .map(|e| e.job.clone())
    }

    fn with_entry<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut Entry) -> T,
    ) -> Result<T, QueueError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.job.id == id)
            .ok_or_else(|| QueueError::NotFound(id.as_uuid().to_string()))?;
        Ok(f(entry))
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(QueuePolicy::default())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &CallJob) -> Result<(), QueueError> {
        self.entries.lock().push(Entry {
            job: job.clone(),
            locked_until: None,
        });
        Ok(())
    }

    async fn claim(&self) -> Result<Option<CallJob>, QueueError> {
        let now = Utc::now();
        let mut entries = self.entries.lock();

        let claimable = entries
            .iter_mut()
            .filter(|e| e.job.attempts < self.policy.max_attempts)
            .filter(|e| match e.job.status {
                JobStatus::Queued => e.job.available_at <= now,
                JobStatus::Processing => e.locked_until.is_some_and(|until| until < now),
                _ => false,
            })
            .min_by_key(|e| (e.job.available_at, e.job.created_at));

        Ok(claimable.map(|entry| {
            entry.job.status = JobStatus::Processing;
            entry.job.attempts += 1;
            entry.job.updated_at = now;
            entry.locked_until =
                Some(now + QueuePolicy::chrono_duration(self.policy.visibility_timeout));
            entry.job.clone()
        }))
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.with_entry(id, |entry| {
            entry.job.status = JobStatus::Completed;
            entry.job.updated_at = Utc::now();
            entry.locked_until = None;
        })
    }

    async fn retry(&self, id: JobId, error_message: &str) -> Result<(), QueueError> {
        let max_attempts = self.policy.max_attempts;
        let backoff = QueuePolicy::chrono_duration(self.policy.retry_backoff);
        self.with_entry(id, |entry| {
            let now = Utc::now();
            entry.job.status = if entry.job.attempts >= max_attempts {
                JobStatus::Failed
            } else {
                JobStatus::Queued
            };
            entry.job.available_at = now + backoff;
            entry.job.error_message = Some(error_message.to_string());
            entry.job.updated_at = now;
            entry.locked_until = None;
        })
    }

    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), QueueError> {
        self.with_entry(id, |entry| {
            entry.job.status = JobStatus::Failed;
            entry.job.error_message = Some(error_message.to_string());
            entry.job.updated_at = Utc::now();
            entry.locked_until = None;
        })
    }
}
