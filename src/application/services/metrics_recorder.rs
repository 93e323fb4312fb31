use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{MetricsSink, RouterCallRecord};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Buffers router attempt records and writes them to a sink in batches.
///
/// A batch is flushed when it reaches `batch_size`, on every timer tick once
/// `start` has been called, and on `shutdown`. With the loop running, a full
/// buffer only wakes it, so `record` never waits on the sink. A failed write
/// is logged record by record and the batch is dropped.
pub struct MetricsRecorder {
    buffer: Mutex<Vec<RouterCallRecord>>,
    sink: Arc<dyn MetricsSink>,
    batch_size: usize,
    flush_interval: Duration,
    shutdown: CancellationToken,
    wake: Notify,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsRecorder {
    pub fn new(sink: Arc<dyn MetricsSink>, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            sink,
            batch_size: batch_size.max(1),
            flush_interval,
            shutdown: CancellationToken::new(),
            wake: Notify::new(),
            flush_task: Mutex::new(None),
        }
    }

    /// Spawns the periodic flush loop.
    pub fn start(self: &Arc<Self>) {
        let recorder = Arc::clone(self);
        let handle = tokio::spawn(async move { recorder.flush_loop().await });
        *self.flush_task.lock() = Some(handle);
    }

    pub async fn record(&self, record: RouterCallRecord) {
        let full = {
            let mut buffer = self.buffer.lock();
            buffer.push(record);
            buffer.len() >= self.batch_size
        };
        if !full {
            return;
        }
        let loop_running = self.flush_task.lock().is_some();
        if loop_running {
            self.wake.notify_one();
        } else {
            self.flush().await;
        }
    }

    /// Writes out whatever is buffered and returns how many records were taken.
    pub async fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return 0;
        }

        match self.sink.write_batch(&batch).await {
            Ok(()) => {
                tracing::debug!(count = batch.len(), "Flushed router metrics");
            }
            Err(e) => {
                tracing::warn!(error = %e, count = batch.len(), "Metrics sink write failed, logging batch instead");
                for record in &batch {
                    match serde_json::to_string(record) {
                        Ok(json) => tracing::warn!(record = %json, "Unpersisted router metric"),
                        Err(e) => tracing::warn!(error = %e, provider = %record.provider, "Unserializable router metric"),
                    }
                }
            }
        }
        batch.len()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Stops the flush loop and flushes what is left.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.flush_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Metrics flush loop ended abnormally");
            }
        }
        self.flush().await;
    }

    async fn flush_loop(&self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.wake.notified() => {
                    self.flush().await;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }
    }
}
