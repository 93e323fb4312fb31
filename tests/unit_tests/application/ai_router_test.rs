use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use callwise::application::ports::{GenerationRequest, LlmProvider, ProviderError};
use callwise::application::services::{
    AiRouter, MetricsRecorder, NO_PROVIDER_AVAILABLE, ProviderHealth, RouterConfig, RoutingMode,
    StreamEvent,
};
use crate::helpers::{RecordingSink, ScriptedProvider, server_error, text_output};

fn config(mode: RoutingMode, retry_max: u32) -> RouterConfig {
    RouterConfig {
        mode,
        primary: None,
        secondary: None,
        retry_max,
        attempt_timeout: Duration::from_secs(5),
        backoff_base: Duration::ZERO,
    }
}

fn health(threshold: u32) -> Arc<ProviderHealth> {
    Arc::new(ProviderHealth::new(threshold, Duration::from_secs(60)))
}

fn router(providers: Vec<Arc<ScriptedProvider>>, health: Arc<ProviderHealth>, config: RouterConfig) -> AiRouter {
    let providers: Vec<Arc<dyn LlmProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn LlmProvider>)
        .collect();
    AiRouter::new(providers, health, config)
}

fn names(router: &AiRouter) -> Vec<String> {
    router
        .select_providers()
        .iter()
        .map(|p| p.name().to_string())
        .collect()
}

fn summary_request() -> GenerationRequest {
    GenerationRequest::new("Summarize the call").with_json_schema(json!({
        "type": "object",
        "properties": { "summary": { "type": "string" } },
        "required": ["summary"]
    }))
}

#[tokio::test]
async fn given_primary_returns_server_errors_when_routing_then_retries_and_falls_back_to_secondary() {
    let primary = Arc::new(ScriptedProvider::new("primary", 0.0001).always(Err(server_error())));
    let secondary = Arc::new(ScriptedProvider::new("secondary", 0.0002));
    let mut cfg = config(RoutingMode::PrimaryFallback, 1);
    cfg.primary = Some("primary".to_string());
    cfg.secondary = Some("secondary".to_string());
    let router = router(vec![secondary.clone(), primary.clone()], health(10), cfg);

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(result.ok);
    assert_eq!(result.provider.as_deref(), Some("secondary"));
    assert_eq!(result.text.as_deref(), Some("answer from secondary"));
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 1);
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn given_no_named_primary_when_selecting_then_registration_order_is_used() {
    let a = Arc::new(ScriptedProvider::new("a", 0.3));
    let b = Arc::new(ScriptedProvider::new("b", 0.1));
    let router = router(vec![a, b], health(3), config(RoutingMode::PrimaryFallback, 0));

    assert_eq!(names(&router), vec!["a", "b"]);
}

#[tokio::test]
async fn given_unauthorized_error_when_routing_then_fails_over_without_retrying() {
    let primary = Arc::new(ScriptedProvider::new("primary", 0.0001).always(Err(
        ProviderError::Unauthorized {
            status: 401,
            body: "bad key".to_string(),
        },
    )));
    let secondary = Arc::new(ScriptedProvider::new("secondary", 0.0001));
    let router = router(
        vec![primary.clone(), secondary.clone()],
        health(10),
        config(RoutingMode::PrimaryFallback, 3),
    );

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(result.ok);
    assert_eq!(primary.calls(), 1);
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn given_cheapest_mode_when_providers_fail_and_recover_then_order_and_error_rates_follow_outcomes() {
    let x = Arc::new(
        ScriptedProvider::new("x", 0.00005)
            .then(Err(server_error()))
            .then(Err(server_error())),
    );
    let y = Arc::new(ScriptedProvider::new("y", 0.0001).then(Err(server_error())));
    let health = health(10);
    let router = router(vec![y.clone(), x.clone()], Arc::clone(&health), config(RoutingMode::Cheapest, 0));

    assert_eq!(names(&router), vec!["x", "y"]);

    let first = router.route(&GenerationRequest::new("round one")).await;
    assert!(!first.ok);
    let x_after_first = health.metrics("x").unwrap().error_rate;
    let y_after_first = health.metrics("y").unwrap().error_rate;
    assert!((x_after_first - 0.2).abs() < 1e-9);
    assert!((y_after_first - 0.2).abs() < 1e-9);

    let second = router.route(&GenerationRequest::new("round two")).await;
    assert!(second.ok);
    assert_eq!(second.provider.as_deref(), Some("y"));

    let x_after_second = health.metrics("x").unwrap().error_rate;
    let y_after_second = health.metrics("y").unwrap().error_rate;
    assert!(x_after_second > x_after_first);
    assert!(y_after_second < y_after_first);
    assert!((x_after_second - 0.36).abs() < 1e-9);
    assert!((y_after_second - 0.16).abs() < 1e-9);
}

#[tokio::test]
async fn given_balanced_mode_when_one_provider_has_errors_then_it_is_ranked_last() {
    let a = Arc::new(ScriptedProvider::new("a", 0.0001));
    let b = Arc::new(ScriptedProvider::new("b", 0.0001));
    let health = health(10);
    let router = router(vec![a, b], Arc::clone(&health), config(RoutingMode::Balanced, 0));

    health.record_failure("a", Duration::from_millis(40));
    health.record_success("b", Duration::from_millis(40));

    assert_eq!(names(&router), vec!["b", "a"]);
}

#[tokio::test(start_paused = true)]
async fn given_repeated_failures_when_threshold_reached_then_circuit_opens_until_window_expires() {
    let flaky = Arc::new(ScriptedProvider::new("flaky", 0.0001).always(Err(server_error())));
    let backup = Arc::new(ScriptedProvider::new("backup", 0.0002));
    let health = health(2);
    let router = router(
        vec![flaky.clone(), backup.clone()],
        Arc::clone(&health),
        config(RoutingMode::PrimaryFallback, 0),
    );

    router.route(&GenerationRequest::new("one")).await;
    router.route(&GenerationRequest::new("two")).await;
    assert_eq!(flaky.calls(), 2);
    assert!(health.circuit("flaky").unwrap().open);

    let skipped = router.route(&GenerationRequest::new("three")).await;
    assert!(skipped.ok);
    assert_eq!(skipped.provider.as_deref(), Some("backup"));
    assert_eq!(flaky.calls(), 2);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(health.is_available("flaky"));

    router.route(&GenerationRequest::new("trial")).await;
    assert_eq!(flaky.calls(), 3);
    assert!(health.circuit("flaky").unwrap().open);
}

#[tokio::test]
async fn given_circuit_trips_mid_retry_when_routing_then_provider_is_abandoned() {
    let flaky = Arc::new(ScriptedProvider::new("flaky", 0.0001).always(Err(server_error())));
    let backup = Arc::new(ScriptedProvider::new("backup", 0.0002));
    let router = router(
        vec![flaky.clone(), backup.clone()],
        health(2),
        config(RoutingMode::PrimaryFallback, 5),
    );

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(result.ok);
    assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn given_output_violating_schema_when_routing_then_provider_is_not_retried() {
    let sloppy = Arc::new(
        ScriptedProvider::new("sloppy", 0.0001).always(Ok(text_output(r#"{"headline": "no summary"}"#))),
    );
    let strict = Arc::new(
        ScriptedProvider::new("strict", 0.0002).always(Ok(text_output(r#"{"summary": "Pricing call"}"#))),
    );
    let router = router(
        vec![sloppy.clone(), strict.clone()],
        health(10),
        config(RoutingMode::PrimaryFallback, 3),
    );

    let result = router.route(&summary_request()).await;

    assert!(result.ok);
    assert_eq!(sloppy.calls(), 1);
    assert_eq!(result.provider.as_deref(), Some("strict"));
    assert_eq!(result.json, Some(json!({ "summary": "Pricing call" })));
}

#[tokio::test]
async fn given_unparseable_json_when_routing_then_same_provider_is_retried() {
    let provider = Arc::new(
        ScriptedProvider::new("only", 0.0001)
            .then(Ok(text_output("Sorry, I cannot do that")))
            .always(Ok(text_output("```json\n{\"summary\": \"Renewal\",}\n```"))),
    );
    let router = router(vec![provider.clone()], health(10), config(RoutingMode::PrimaryFallback, 1));

    let result = router.route(&summary_request()).await;

    assert!(result.ok);
    assert_eq!(provider.calls(), 2);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.json, Some(json!({ "summary": "Renewal" })));
}

#[tokio::test]
async fn given_every_circuit_open_when_routing_then_reports_no_provider_available() {
    let a = Arc::new(ScriptedProvider::new("a", 0.0001));
    let health = health(1);
    let router = router(vec![a.clone()], Arc::clone(&health), config(RoutingMode::PrimaryFallback, 0));
    health.record_failure("a", Duration::from_millis(5));

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(!result.ok);
    assert_eq!(result.attempts, 0);
    assert_eq!(a.calls(), 0);
    let error = result.error.expect("failure carries an error");
    assert_eq!(error.message, NO_PROVIDER_AVAILABLE);
}

#[tokio::test]
async fn given_all_providers_fail_when_routing_then_last_error_is_returned() {
    let a = Arc::new(ScriptedProvider::new("a", 0.0001).always(Err(server_error())));
    let b = Arc::new(ScriptedProvider::new("b", 0.0001).always(Err(ProviderError::Rejected {
        status: 400,
        body: "context too long".to_string(),
    })));
    let router = router(vec![a, b], health(10), config(RoutingMode::PrimaryFallback, 0));

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(!result.ok);
    assert_eq!(result.provider.as_deref(), Some("b"));
    let error = result.error.expect("failure carries an error");
    assert!(!error.retriable);
    assert!(error.message.contains("context too long"));
}

#[tokio::test(start_paused = true)]
async fn given_slow_provider_when_attempt_times_out_then_next_provider_answers() {
    let slow = Arc::new(ScriptedProvider::new("slow", 0.0001).with_delay(Duration::from_secs(10)));
    let fast = Arc::new(ScriptedProvider::new("fast", 0.0001));
    let mut cfg = config(RoutingMode::PrimaryFallback, 0);
    cfg.attempt_timeout = Duration::from_millis(200);
    let health = health(10);
    let router = router(vec![slow.clone(), fast], Arc::clone(&health), cfg);

    let result = router.route(&GenerationRequest::new("hello")).await;

    assert!(result.ok);
    assert_eq!(result.provider.as_deref(), Some("fast"));
    assert_eq!(slow.calls(), 1);
    assert_eq!(health.circuit("slow").unwrap().consecutive_failures, 1);
    assert_eq!(health.circuit("fast").unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn given_metrics_recorder_when_routing_then_every_attempt_is_recorded() {
    let a = Arc::new(ScriptedProvider::new("a", 0.001).then(Err(server_error())));
    let sink = Arc::new(RecordingSink::default());
    let recorder = Arc::new(MetricsRecorder::new(sink.clone(), 100, Duration::from_secs(60)));
    let router = router(vec![a], health(10), config(RoutingMode::PrimaryFallback, 1))
        .with_metrics_recorder(Arc::clone(&recorder));

    let result = router.route(&GenerationRequest::new("hello")).await;
    recorder.flush().await;

    assert!(result.ok);
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert!(!records[0].ok);
    assert_eq!(records[0].retriable, Some(true));
    assert!(records[1].ok);
    assert_eq!(records[1].attempt, 2);
    assert!((records[1].estimated_cost - 15.0 * 0.001).abs() < 1e-9);
}

#[tokio::test]
async fn given_streaming_provider_when_routing_stream_then_chunks_arrive_in_order() {
    let a = Arc::new(ScriptedProvider::new("a", 0.0001).streaming(&["Hel", "lo", " there"]));
    let router = router(vec![a], health(10), config(RoutingMode::PrimaryFallback, 0));

    let stream = router.route_stream(&GenerationRequest::new("hello")).await;
    let (text, summary) = stream.collect_text().await.expect("stream completes");

    assert_eq!(text, "Hello there");
    assert_eq!(summary.provider, "a");
    assert_eq!(summary.chars, 11);
}

#[tokio::test]
async fn given_stream_cannot_open_when_routing_stream_then_next_provider_streams() {
    let broken = Arc::new(ScriptedProvider::new("broken", 0.0001).always(Err(server_error())));
    let healthy = Arc::new(ScriptedProvider::new("healthy", 0.0001).streaming(&["ok"]));
    let health = health(10);
    let router = router(vec![broken, healthy], Arc::clone(&health), config(RoutingMode::PrimaryFallback, 0));

    let mut stream = router.route_stream(&GenerationRequest::new("hello")).await;

    let mut chunks = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Chunk(chunk) => chunks.push(chunk),
            StreamEvent::Done(summary) => {
                assert_eq!(summary.provider, "healthy");
                break;
            }
            StreamEvent::Failed(error) => panic!("unexpected failure: {}", error.message),
        }
    }
    assert_eq!(chunks, vec!["ok".to_string()]);
    assert!(health.metrics("broken").unwrap().error_rate > 0.0);
}

#[tokio::test]
async fn given_no_stream_can_open_when_routing_stream_then_single_failure_event_is_sent() {
    let broken = Arc::new(ScriptedProvider::new("broken", 0.0001).always(Err(server_error())));
    let router = router(vec![broken], health(10), config(RoutingMode::PrimaryFallback, 0));

    let stream = router.route_stream(&GenerationRequest::new("hello")).await;
    let error = stream.collect_text().await.expect_err("stream fails");

    assert!(error.retriable);
    assert!(error.message.contains("500"));
}
