use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::QueuePolicy;
use crate::application::ports::{JobQueue, QueueError};
use crate::domain::{CallJob, JobId, JobStatus};

pub struct PgJobQueue {
    pool: PgPool,
    policy: QueuePolicy,
}

impl PgJobQueue {
    pub fn new(pool: PgPool, policy: QueuePolicy) -> Self {
        Self { pool, policy }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    external_call_id: String,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    error_message: Option<String>,
    available_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for CallJob {
    type Error = QueueError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        Ok(CallJob {
            id: JobId::from_uuid(r.id),
            external_call_id: r.external_call_id,
            payload: r.payload,
            status: r.status.parse::<JobStatus>().map_err(QueueError::QueryFailed)?,
            attempts: r.attempts.max(0) as u32,
            error_message: r.error_message,
            available_at: r.available_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    #[instrument(skip(self, job), fields(job_id = %job.id.as_uuid(), external_call_id = %job.external_call_id))]
    async fn enqueue(&self, job: &CallJob) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            INSERT INTO call_jobs (id, external_call_id, payload, status, attempts, error_message,
                                   available_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.external_call_id)
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(&job.error_message)
        .bind(job.available_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::EnqueueFailed(e.to_string()))?;
        Ok(())
    }

    /// Claims the oldest available job, including ones whose previous claim lapsed.
    #[instrument(skip(self))]
    async fn claim(&self) -> Result<Option<CallJob>, QueueError> {
        let now = Utc::now();
        let locked_until = now + QueuePolicy::chrono_duration(self.policy.visibility_timeout);

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE call_jobs
            SET status = 'PROCESSING',
                attempts = attempts + 1,
                locked_until = $1,
                updated_at = $2
            WHERE id = (
                SELECT id FROM call_jobs
                WHERE attempts < $3
                  AND ((status = 'QUEUED' AND available_at <= $2)
                    OR (status = 'PROCESSING' AND locked_until < $2))
                ORDER BY available_at, created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, external_call_id, payload, status, attempts, error_message,
                      available_at, created_at, updated_at
            "#,
        )
        .bind(locked_until)
        .bind(now)
        .bind(self.policy.max_attempts as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::QueryFailed(e.to_string()))?;

        let job = row.map(CallJob::try_from).transpose()?;
        if let Some(job) = &job {
            debug!(job_id = %job.id.as_uuid(), attempts = job.attempts, "Job claimed");
        }
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.settle(id, JobStatus::Completed, None).await
    }

    #[instrument(skip(self, error_message), fields(job_id = %id.as_uuid()))]
    async fn retry(&self, id: JobId, error_message: &str) -> Result<(), QueueError> {
        let available_at = Utc::now() + QueuePolicy::chrono_duration(self.policy.retry_backoff);

        let status: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE call_jobs
            SET status = CASE WHEN attempts >= $1 THEN 'FAILED' ELSE 'QUEUED' END,
                available_at = $2,
                locked_until = NULL,
                error_message = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING status
            "#,
        )
        .bind(self.policy.max_attempts as i32)
        .bind(available_at)
        .bind(error_message)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::QueryFailed(e.to_string()))?;

        match status.as_deref() {
            None => Err(QueueError::NotFound(id.as_uuid().to_string())),
            Some("FAILED") => {
                warn!(job_id = %id.as_uuid(), error = error_message, "Job exhausted its attempts");
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }

    #[instrument(skip(self, error_message), fields(job_id = %id.as_uuid()))]
    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), QueueError> {
        self.settle(id, JobStatus::Failed, Some(error_message)).await
    }
}

impl PgJobQueue {
    async fn settle(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE call_jobs
            SET status = $1, error_message = COALESCE($2, error_message),
                locked_until = NULL, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::QueryFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.as_uuid().to_string()));
        }
        Ok(())
    }
}
