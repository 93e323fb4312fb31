use std::sync::Arc;
use std::time::Duration;

use callwise::application::services::MetricsRecorder;
use crate::helpers::{RecordingSink, router_record};

#[tokio::test]
async fn given_batch_size_reached_when_recording_then_batch_is_flushed_immediately() {
    let sink = Arc::new(RecordingSink::default());
    let recorder = MetricsRecorder::new(sink.clone(), 3, Duration::from_secs(3600));

    recorder.record(router_record("a", true)).await;
    recorder.record(router_record("b", false)).await;
    assert_eq!(sink.batch_count(), 0);
    assert_eq!(recorder.buffered(), 2);

    recorder.record(router_record("a", true)).await;

    assert_eq!(sink.batch_count(), 1);
    assert_eq!(sink.records().len(), 3);
    assert_eq!(recorder.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_started_recorder_when_batch_fills_then_write_happens_off_the_recording_path() {
    let sink = Arc::new(RecordingSink::default());
    let recorder = Arc::new(MetricsRecorder::new(sink.clone(), 2, Duration::from_secs(3600)));
    recorder.start();

    recorder.record(router_record("a", true)).await;
    recorder.record(router_record("b", true)).await;
    assert_eq!(sink.batch_count(), 0);

    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(sink.batch_count(), 1);
    assert_eq!(sink.records().len(), 2);
    assert_eq!(recorder.buffered(), 0);
    recorder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn given_started_recorder_when_interval_elapses_then_partial_batch_is_flushed() {
    let sink = Arc::new(RecordingSink::default());
    let recorder = Arc::new(MetricsRecorder::new(sink.clone(), 50, Duration::from_secs(5)));
    recorder.start();

    recorder.record(router_record("a", true)).await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(sink.records().len(), 1);
    recorder.shutdown().await;
}

#[tokio::test]
async fn given_failing_sink_when_flushing_then_batch_is_dropped_without_error() {
    let sink = Arc::new(RecordingSink::failing());
    let recorder = MetricsRecorder::new(sink.clone(), 50, Duration::from_secs(60));

    recorder.record(router_record("a", false)).await;
    let taken = recorder.flush().await;

    assert_eq!(taken, 1);
    assert_eq!(recorder.buffered(), 0);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn given_buffered_records_when_shutting_down_then_remainder_is_written() {
    let sink = Arc::new(RecordingSink::default());
    let recorder = Arc::new(MetricsRecorder::new(sink.clone(), 50, Duration::from_secs(60)));
    recorder.start();

    recorder.record(router_record("a", true)).await;
    recorder.record(router_record("b", true)).await;
    recorder.shutdown().await;

    assert_eq!(sink.records().len(), 2);
}

#[tokio::test]
async fn given_empty_buffer_when_flushing_then_sink_is_not_called() {
    let sink = Arc::new(RecordingSink::default());
    let recorder = MetricsRecorder::new(sink.clone(), 50, Duration::from_secs(60));

    assert_eq!(recorder.flush().await, 0);
    assert_eq!(sink.batch_count(), 0);
}
