use std::time::Duration;

use callwise::application::ports::JobQueue;
use callwise::domain::{CallJob, JobStatus};
use callwise::infrastructure::persistence::{InMemoryJobQueue, QueuePolicy};

fn policy(max_attempts: u32, visibility_ms: u64, backoff_ms: u64) -> QueuePolicy {
    QueuePolicy {
        max_attempts,
        visibility_timeout: Duration::from_millis(visibility_ms),
        retry_backoff: Duration::from_millis(backoff_ms),
    }
}

fn job(external_id: &str) -> CallJob {
    CallJob::new(external_id.to_string(), serde_json::Value::Null)
}

#[tokio::test]
async fn given_queued_job_when_claimed_then_it_is_invisible_to_the_next_claim() {
    let queue = InMemoryJobQueue::default();
    queue.enqueue(&job("a")).await.unwrap();

    let claimed = queue.claim().await.unwrap().expect("claimable");

    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.attempts, 1);
    assert!(queue.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn given_two_jobs_when_claiming_then_oldest_is_claimed_first() {
    let queue = InMemoryJobQueue::default();
    let first = job("first");
    queue.enqueue(&first).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    queue.enqueue(&job("second")).await.unwrap();

    let claimed = queue.claim().await.unwrap().unwrap();

    assert_eq!(claimed.id, first.id);
}

#[tokio::test]
async fn given_completed_job_when_claiming_then_nothing_is_returned() {
    let queue = InMemoryJobQueue::new(policy(5, 0, 0));
    let job = job("a");
    queue.enqueue(&job).await.unwrap();
    queue.claim().await.unwrap().unwrap();
    queue.complete(job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(queue.claim().await.unwrap().is_none());
    assert_eq!(queue.get(job.id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn given_retried_job_when_backoff_elapses_then_it_is_redelivered() {
    let queue = InMemoryJobQueue::new(policy(5, 60_000, 20));
    let job = job("a");
    queue.enqueue(&job).await.unwrap();
    queue.claim().await.unwrap().unwrap();

    queue.retry(job.id, "transient").await.unwrap();
    assert!(queue.claim().await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(40)).await;

    let redelivered = queue.claim().await.unwrap().expect("redelivered");
    assert_eq!(redelivered.attempts, 2);
    assert_eq!(redelivered.error_message.as_deref(), Some("transient"));
}

#[tokio::test]
async fn given_exhausted_attempts_when_retrying_then_job_fails() {
    let queue = InMemoryJobQueue::new(policy(2, 60_000, 0));
    let job = job("a");
    queue.enqueue(&job).await.unwrap();

    queue.claim().await.unwrap().unwrap();
    queue.retry(job.id, "first").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    queue.claim().await.unwrap().unwrap();
    queue.retry(job.id, "second").await.unwrap();

    let settled = queue.get(job.id).unwrap();
    assert_eq!(settled.status, JobStatus::Failed);
    assert_eq!(settled.attempts, 2);
    assert!(queue.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn given_lapsed_visibility_timeout_when_claiming_then_job_is_redelivered() {
    let queue = InMemoryJobQueue::new(policy(3, 5, 0));
    let job = job("a");
    queue.enqueue(&job).await.unwrap();
    queue.claim().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let again = queue.claim().await.unwrap().expect("visibility lapsed");

    assert_eq!(again.id, job.id);
    assert_eq!(again.attempts, 2);
}

#[tokio::test]
async fn given_crashed_consumer_on_last_attempt_when_visibility_lapses_then_job_is_not_redelivered() {
    let queue = InMemoryJobQueue::new(policy(1, 5, 0));
    queue.enqueue(&job("a")).await.unwrap();
    queue.claim().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(queue.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn given_unknown_job_when_completing_then_not_found_is_returned() {
    let queue = InMemoryJobQueue::default();

    let result = queue.complete(callwise::domain::JobId::new()).await;

    assert!(result.is_err());
}
