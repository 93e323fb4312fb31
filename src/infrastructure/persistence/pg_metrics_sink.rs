use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use crate::application::ports::{MetricsSink, MetricsSinkError, RouterCallRecord};

/// Writes router attempt records into `router_metrics`.
pub struct PgMetricsSink {
    pool: PgPool,
}

impl PgMetricsSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsSink for PgMetricsSink {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn write_batch(&self, records: &[RouterCallRecord]) -> Result<(), MetricsSinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO router_metrics \
             (provider, model, ok, attempt, latency_ms, retriable, error, estimated_cost, recorded_at) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(&record.provider)
                .push_bind(&record.model)
                .push_bind(record.ok)
                .push_bind(record.attempt as i32)
                .push_bind(record.latency_ms as i64)
                .push_bind(record.retriable)
                .push_bind(&record.error)
                .push_bind(record.estimated_cost)
                .push_bind(record.recorded_at);
        });

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| MetricsSinkError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
