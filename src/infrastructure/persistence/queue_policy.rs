use std::time::Duration;

/// Redelivery rules shared by every job queue adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuePolicy {
    pub max_attempts: u32,
    /// How long a claimed job stays invisible before another worker may take it.
    pub visibility_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            visibility_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(30),
        }
    }
}

impl QueuePolicy {
    pub(crate) fn chrono_duration(duration: Duration) -> chrono::Duration {
        chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
    }
}
