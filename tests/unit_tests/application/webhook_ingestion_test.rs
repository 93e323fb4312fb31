use std::sync::Arc;

use callwise::application::ports::CallRepository;
use callwise::application::services::{
    CallEvent, DropReason, EventValidationError, IngestOutcome, IngestionError,
    WebhookIngestionService, WebhookVerifier,
};
use callwise::domain::CallStatus;
use callwise::infrastructure::persistence::{InMemoryCallRepository, InMemoryJobQueue};
use crate::helpers::{OfflineQueue, call_event_body, verifier};

fn service() -> (WebhookIngestionService, Arc<InMemoryCallRepository>, Arc<InMemoryJobQueue>) {
    let calls = Arc::new(InMemoryCallRepository::new());
    let queue = Arc::new(InMemoryJobQueue::default());
    let service = WebhookIngestionService::new(verifier(), calls.clone(), queue.clone());
    (service, calls, queue)
}

#[test]
fn given_signed_body_when_verifying_then_plain_and_prefixed_signatures_pass() {
    let verifier = verifier();
    let body = call_event_body("ext-1");
    let signature = verifier.sign(&body);

    assert!(verifier.verify(&body, Some(&signature)));
    assert!(verifier.verify(&body, Some(&format!("sha256={}", signature))));
    assert!(!verifier.verify(b"tampered", Some(&signature)));
    assert!(!verifier.verify(&body, Some("zz-not-hex")));
    assert!(!verifier.verify(&body, None));
}

#[test]
fn given_different_secret_when_verifying_then_signature_is_rejected() {
    let body = call_event_body("ext-1");
    let other = WebhookVerifier::new(b"another-secret").expect("valid key");

    assert!(!verifier().verify(&body, Some(&other.sign(&body))));
}

#[tokio::test]
async fn given_valid_signed_event_when_ingesting_then_call_is_created_and_job_enqueued() {
    let (service, calls, queue) = service();
    let body = call_event_body("ext-100");
    let signature = verifier().sign(&body);

    let outcome = service.ingest(&body, Some(&signature)).await.expect("ingested");

    let IngestOutcome::Accepted { call_id, created, .. } = outcome else {
        panic!("expected accepted outcome, got {:?}", outcome);
    };
    assert!(created);
    let call = calls.get_by_id(call_id).await.unwrap().expect("call stored");
    assert_eq!(call.external_id, "ext-100");
    assert_eq!(call.status, CallStatus::Received);
    assert_eq!(call.duration_secs, Some(184));
    assert!(call.consent);

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].external_call_id, "ext-100");
    assert_eq!(jobs[0].payload["call_id"], "ext-100");
}

#[tokio::test]
async fn given_same_event_delivered_twice_when_ingesting_then_one_call_exists() {
    let (service, calls, _queue) = service();
    let body = call_event_body("ext-dup");
    let signature = verifier().sign(&body);

    let first = service.ingest(&body, Some(&signature)).await.expect("first");
    let second = service.ingest(&body, Some(&signature)).await.expect("second");

    let (IngestOutcome::Accepted { call_id: a, created: created_a, .. }, IngestOutcome::Accepted { call_id: b, created: created_b, .. }) = (first, second) else {
        panic!("both deliveries should be accepted");
    };
    assert_eq!(a, b);
    assert!(created_a);
    assert!(!created_b);
    assert_eq!(calls.call_count(), 1);
}

#[tokio::test]
async fn given_bad_signature_when_ingesting_then_event_is_dropped_silently() {
    let (service, calls, queue) = service();
    let body = call_event_body("ext-forged");

    let outcome = service.ingest(&body, Some("deadbeef")).await.expect("no error");

    assert_eq!(outcome, IngestOutcome::Dropped(DropReason::InvalidSignature));
    assert_eq!(calls.call_count(), 0);
    assert!(queue.jobs().is_empty());
}

#[tokio::test]
async fn given_negative_duration_when_ingesting_then_event_is_dropped_as_invalid() {
    let (service, calls, _queue) = service();
    let body = serde_json::json!({
        "event": "call.completed",
        "call_id": "ext-neg",
        "from": "+15551234567",
        "to": "+15557654321",
        "agent_id": "agent-7",
        "duration": -5,
        "timestamp": 1_767_225_600
    })
    .to_string()
    .into_bytes();
    let signature = verifier().sign(&body);

    let outcome = service.ingest(&body, Some(&signature)).await.expect("no error");

    assert_eq!(
        outcome,
        IngestOutcome::Dropped(DropReason::InvalidPayload(EventValidationError::NegativeDuration(-5)))
    );
    assert_eq!(calls.call_count(), 0);
}

#[tokio::test]
async fn given_enqueue_failure_when_ingesting_then_error_is_returned() {
    let calls = Arc::new(InMemoryCallRepository::new());
    let service = WebhookIngestionService::new(verifier(), calls.clone(), Arc::new(OfflineQueue));
    let body = call_event_body("ext-offline");
    let signature = verifier().sign(&body);

    let result = service.ingest(&body, Some(&signature)).await;

    assert!(matches!(result, Err(IngestionError::Enqueue(_))));
}

#[test]
fn given_epoch_millis_timestamp_when_parsing_then_it_is_read_as_milliseconds() {
    let body = br#"{"event":"call.completed","call_id":"c1","from":"1","to":"2","agent_id":"a","timestamp":1767225600000}"#;

    let event = CallEvent::parse(body).expect("valid event");

    assert_eq!(event.timestamp.timestamp(), 1_767_225_600);
}

#[test]
fn given_blank_agent_when_parsing_then_missing_field_is_reported() {
    let body = br#"{"event":"call.completed","call_id":"c1","from":"1","to":"2","agent_id":"  ","timestamp":"2026-01-01T00:00:00Z"}"#;

    assert_eq!(
        CallEvent::parse(body),
        Err(EventValidationError::MissingField("agent_id"))
    );
}

#[test]
fn given_ftp_recording_url_when_parsing_then_url_is_rejected() {
    let body = br#"{"event":"call.completed","call_id":"c1","from":"1","to":"2","agent_id":"a","recording_url":"ftp://host/a.mp3","timestamp":"2026-01-01T00:00:00Z"}"#;

    assert!(matches!(
        CallEvent::parse(body),
        Err(EventValidationError::InvalidRecordingUrl(_))
    ));
}

#[test]
fn given_body_that_is_not_json_when_parsing_then_malformed_is_reported() {
    assert!(matches!(
        CallEvent::parse(b"call finished"),
        Err(EventValidationError::Malformed(_))
    ));
}
