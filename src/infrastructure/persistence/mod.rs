mod in_memory_call_repository;
mod in_memory_job_queue;
mod pg_call_repository;
mod pg_job_queue;
mod pg_metrics_sink;
mod pg_pool;
mod queue_policy;

pub use in_memory_call_repository::InMemoryCallRepository;
pub use in_memory_job_queue::InMemoryJobQueue;
pub use pg_call_repository::PgCallRepository;
pub use pg_job_queue::PgJobQueue;
pub use pg_metrics_sink::PgMetricsSink;
pub use pg_pool::{create_pool, run_migrations};
pub use queue_policy::QueuePolicy;

pub(crate) use pg_pool::map_sqlx_error;
