use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::generation_stream::{GenerationStream, STREAM_CHANNEL_CAPACITY, StreamEvent, StreamProducer};
use super::{MetricsRecorder, ProviderHealth};
use crate::application::ports::{
    GenerationOutput, GenerationRequest, LlmProvider, ProviderError, RouterCallRecord,
    extract_json,
};

pub const NO_PROVIDER_AVAILABLE: &str = "no_provider_available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    PrimaryFallback,
    Cheapest,
    Balanced,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub mode: RoutingMode,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    /// Retries per provider after the first attempt.
    pub retry_max: u32,
    pub attempt_timeout: Duration,
    /// Sleep before retry `n` is `backoff_base * n`.
    pub backoff_base: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::PrimaryFallback,
            primary: None,
            secondary: None,
            retry_max: 1,
            attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenError {
    pub message: String,
    pub retriable: bool,
}

impl GenError {
    pub fn no_provider_available() -> Self {
        Self {
            message: NO_PROVIDER_AVAILABLE.to_string(),
            retriable: true,
        }
    }

    pub(crate) fn from_provider(error: &ProviderError) -> Self {
        Self {
            message: error.to_string(),
            retriable: error.is_retriable(),
        }
    }
}

/// Outcome of a routed generation. Routing never fails with an `Err`; every
/// failure mode is described here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenResult {
    pub ok: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub text: Option<String>,
    pub json: Option<Value>,
    pub error: Option<GenError>,
    pub latency_ms: u64,
    pub attempts: u32,
}

impl GenResult {
    fn success(provider: &dyn LlmProvider, output: GenerationOutput, started: Instant, attempts: u32) -> Self {
        Self {
            ok: true,
            provider: Some(provider.name().to_string()),
            model: Some(output.model),
            text: Some(output.text),
            json: output.json,
            error: None,
            latency_ms: elapsed_ms(started),
            attempts,
        }
    }

    fn failure(provider: Option<&dyn LlmProvider>, error: GenError, started: Instant, attempts: u32) -> Self {
        Self {
            ok: false,
            provider: provider.map(|p| p.name().to_string()),
            model: provider.map(|p| p.model().to_string()),
            text: None,
            json: None,
            error: Some(error),
            latency_ms: elapsed_ms(started),
            attempts,
        }
    }
}

/// Routes generation requests across providers with retries, fallback and
/// per-provider circuit breaking.
pub struct AiRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
    health: Arc<ProviderHealth>,
    config: RouterConfig,
    recorder: Option<Arc<MetricsRecorder>>,
}

impl AiRouter {
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        health: Arc<ProviderHealth>,
        config: RouterConfig,
    ) -> Self {
        for provider in &providers {
            health.register(provider.name(), provider.cost_per_token());
        }
        Self {
            providers,
            health,
            config,
            recorder: None,
        }
    }

    pub fn with_metrics_recorder(mut self, recorder: Arc<MetricsRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn health(&self) -> &Arc<ProviderHealth> {
        &self.health
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Providers in the order the current mode would try them. Circuit state
    /// is not consulted here.
    pub fn select_providers(&self) -> Vec<Arc<dyn LlmProvider>> {
        match self.config.mode {
            RoutingMode::PrimaryFallback => self.fixed_order(),
            RoutingMode::Cheapest => {
                let mut ordered = self.providers.clone();
                ordered.sort_by(|a, b| {
                    let a_cost = self.cost_of(a.as_ref());
                    let b_cost = self.cost_of(b.as_ref());
                    a_cost.total_cmp(&b_cost)
                });
                ordered
            }
            RoutingMode::Balanced => self.balanced_order(),
        }
    }

    pub async fn route(&self, request: &GenerationRequest) -> GenResult {
        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_failure: Option<GenResult> = None;

        for provider in self.select_providers() {
            let name = provider.name();
            if !self.health.is_available(name) {
                tracing::debug!(provider = name, "Skipping provider with open circuit");
                continue;
            }
            let timeout = provider.timeout().unwrap_or(self.config.attempt_timeout);

            for attempt in 1..=self.config.retry_max + 1 {
                if attempt > 1 {
                    tokio::time::sleep(self.config.backoff_base * (attempt - 1)).await;
                }
                attempts += 1;

                let attempt_started = Instant::now();
                let outcome = match tokio::time::timeout(timeout, provider.generate(request)).await
                {
                    Ok(result) => result.and_then(|output| validate_output(request, output)),
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                };
                let latency = attempt_started.elapsed();

                match outcome {
                    Ok(output) => {
                        self.health.record_success(name, latency);
                        self.record_attempt(provider.as_ref(), attempt, latency, None, output.total_tokens())
                            .await;
                        tracing::debug!(provider = name, attempt, latency_ms = latency.as_millis() as u64, "Generation succeeded");
                        return GenResult::success(provider.as_ref(), output, started, attempts);
                    }
                    Err(error) => {
                        self.health.record_failure(name, latency);
                        self.record_attempt(provider.as_ref(), attempt, latency, Some(&error), None)
                            .await;
                        tracing::warn!(
                            provider = name,
                            attempt,
                            retriable = error.is_retriable(),
                            error = %error,
                            "Generation attempt failed"
                        );
                        let retriable = error.is_retriable();
                        last_failure = Some(GenResult::failure(
                            Some(provider.as_ref()),
                            GenError::from_provider(&error),
                            started,
                            attempts,
                        ));
                        if !retriable || !self.health.is_available(name) {
                            break;
                        }
                    }
                }
            }
        }

        match last_failure {
            Some(mut failure) => {
                failure.latency_ms = elapsed_ms(started);
                failure.attempts = attempts;
                failure
            }
            None => {
                tracing::warn!("No provider available for generation");
                GenResult::failure(None, GenError::no_provider_available(), started, attempts)
            }
        }
    }

    /// Opens a streamed generation. Failover happens only while opening the
    /// stream; once chunks flow, a failure ends the stream with `Failed`.
    pub async fn route_stream(&self, request: &GenerationRequest) -> GenerationStream {
        let (sender, receiver) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let mut last_error: Option<GenError> = None;

        for provider in self.select_providers() {
            let name = provider.name();
            if !self.health.is_available(name) {
                continue;
            }
            let timeout = provider.timeout().unwrap_or(self.config.attempt_timeout);
            let started = Instant::now();

            let opened = match tokio::time::timeout(timeout, provider.generate_stream(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            match opened {
                Ok(chunks) => {
                    let producer = StreamProducer {
                        provider: Arc::clone(&provider),
                        health: Arc::clone(&self.health),
                        recorder: self.recorder.clone(),
                        started,
                        idle_timeout: timeout,
                    };
                    tokio::spawn(producer.run(chunks, sender));
                    return GenerationStream::new(receiver);
                }
                Err(error) => {
                    let latency = started.elapsed();
                    self.health.record_failure(name, latency);
                    self.record_attempt(provider.as_ref(), 1, latency, Some(&error), None)
                        .await;
                    tracing::warn!(provider = name, error = %error, "Failed to open generation stream");
                    last_error = Some(GenError::from_provider(&error));
                }
            }
        }

        let error = last_error.unwrap_or_else(GenError::no_provider_available);
        // Capacity is non-zero and nothing else has sent yet.
        let _ = sender.try_send(StreamEvent::Failed(error));
        GenerationStream::new(receiver)
    }

    fn fixed_order(&self) -> Vec<Arc<dyn LlmProvider>> {
        let named: Vec<Arc<dyn LlmProvider>> = [&self.config.primary, &self.config.secondary]
            .into_iter()
            .flatten()
            .filter_map(|name| self.providers.iter().find(|p| p.name() == name).cloned())
            .collect();
        if named.is_empty() {
            self.providers.clone()
        } else {
            named
        }
    }

    fn balanced_order(&self) -> Vec<Arc<dyn LlmProvider>> {
        let snapshot = self.health.snapshot();
        let figures: Vec<(f64, f64, f64)> = self
            .providers
            .iter()
            .map(|p| {
                snapshot
                    .get(p.name())
                    .map(|m| (m.latency_p50_ms, m.error_rate, m.cost_per_token))
                    .unwrap_or((0.0, 0.0, p.cost_per_token()))
            })
            .collect();

        let max_latency = figures.iter().map(|f| f.0).fold(0.0, f64::max);
        let max_cost = figures.iter().map(|f| f.2).fold(0.0, f64::max);

        let mut scored: Vec<(f64, Arc<dyn LlmProvider>)> = self
            .providers
            .iter()
            .zip(figures)
            .map(|(provider, (latency, error_rate, cost))| {
                let score = 0.4 * normalize(latency, max_latency)
                    + 0.3 * error_rate
                    + 0.3 * normalize(cost, max_cost);
                (score, Arc::clone(provider))
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().map(|(_, provider)| provider).collect()
    }

    fn cost_of(&self, provider: &dyn LlmProvider) -> f64 {
        self.health
            .metrics(provider.name())
            .map(|m| m.cost_per_token)
            .unwrap_or_else(|| provider.cost_per_token())
    }

    async fn record_attempt(
        &self,
        provider: &dyn LlmProvider,
        attempt: u32,
        latency: Duration,
        error: Option<&ProviderError>,
        tokens: Option<u32>,
    ) {
        if let Some(recorder) = &self.recorder {
            recorder
                .record(attempt_record(provider, attempt, latency, error, tokens))
                .await;
        }
    }
}

pub(crate) fn attempt_record(
    provider: &dyn LlmProvider,
    attempt: u32,
    latency: Duration,
    error: Option<&ProviderError>,
    tokens: Option<u32>,
) -> RouterCallRecord {
    RouterCallRecord {
        provider: provider.name().to_string(),
        model: provider.model().to_string(),
        ok: error.is_none(),
        attempt,
        latency_ms: latency.as_millis() as u64,
        retriable: error.map(ProviderError::is_retriable),
        error: error.map(ToString::to_string),
        estimated_cost: f64::from(tokens.unwrap_or(0)) * provider.cost_per_token(),
        recorded_at: chrono::Utc::now(),
    }
}

/// Ensures JSON was produced when asked for, and that it satisfies the schema.
/// Unparseable output is retriable; a schema violation is not.
fn validate_output(
    request: &GenerationRequest,
    mut output: GenerationOutput,
) -> Result<GenerationOutput, ProviderError> {
    if !request.wants_json() {
        return Ok(output);
    }

    let json = output
        .json
        .take()
        .or_else(|| extract_json(&output.text))
        .ok_or_else(|| ProviderError::MalformedResponse("expected JSON output".to_string()))?;

    if let Some(schema) = &request.response_schema {
        check_schema(schema, &json).map_err(ProviderError::SchemaMismatch)?;
    }

    output.json = Some(json);
    Ok(output)
}

fn check_schema(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("invalid schema: {}", e))?;
    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
