use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

const LATENCY_ALPHA: f64 = 0.2;
const ERROR_ALPHA: f64 = 0.2;
const P95_RISE_ALPHA: f64 = 0.5;
const P95_DECAY_ALPHA: f64 = 0.05;

/// Rolling health and cost figures for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetrics {
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub error_rate: f64,
    pub cost_per_token: f64,
    pub samples: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProviderMetrics {
    pub fn new(cost_per_token: f64) -> Self {
        Self {
            latency_p50_ms: 0.0,
            latency_p95_ms: 0.0,
            error_rate: 0.0,
            cost_per_token,
            samples: 0,
            last_updated: None,
        }
    }

    fn observe(&mut self, latency: Duration, ok: bool) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        if self.samples == 0 {
            self.latency_p50_ms = latency_ms;
            self.latency_p95_ms = latency_ms;
        } else {
            self.latency_p50_ms = ema(self.latency_p50_ms, latency_ms, LATENCY_ALPHA);
            // Upper-tail tracker: jumps toward slow samples, decays slowly otherwise.
            let alpha = if latency_ms > self.latency_p95_ms {
                P95_RISE_ALPHA
            } else {
                P95_DECAY_ALPHA
            };
            self.latency_p95_ms = ema(self.latency_p95_ms, latency_ms, alpha);
        }
        let failure = if ok { 0.0 } else { 1.0 };
        self.error_rate = ema(self.error_rate, failure, ERROR_ALPHA);
        self.samples += 1;
        self.last_updated = Some(Utc::now());
    }
}

fn ema(previous: f64, sample: f64, alpha: f64) -> f64 {
    previous + alpha * (sample - previous)
}

/// Failure breaker for one provider.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub consecutive_failures: u32,
    pub first_failure_at: Option<Instant>,
    pub opened_at: Option<Instant>,
}

impl Circuit {
    pub fn is_open(&self, now: Instant, window: Duration) -> bool {
        self.opened_at
            .is_some_and(|opened| now.saturating_duration_since(opened) < window)
    }

    fn record_failure(&mut self, now: Instant, threshold: u32, window: Duration) {
        if self.opened_at.is_some() {
            // Half-open trial call failed: trip again straight away.
            self.consecutive_failures += 1;
            self.opened_at = Some(now);
            return;
        }

        let window_lapsed = self
            .first_failure_at
            .is_some_and(|first| now.saturating_duration_since(first) >= window);
        if self.consecutive_failures == 0 || window_lapsed {
            self.consecutive_failures = 1;
            self.first_failure_at = Some(now);
        } else {
            self.consecutive_failures += 1;
        }

        if self.consecutive_failures >= threshold {
            self.opened_at = Some(now);
        }
    }

    fn reset(&mut self) {
        *self = Circuit::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub consecutive_failures: u32,
    pub open: bool,
}

#[derive(Debug, Clone)]
struct ProviderState {
    metrics: ProviderMetrics,
    circuit: Circuit,
}

/// Process-local metrics and circuits for every routed provider.
///
/// Owned by whoever builds the router and shared by `Arc`; each process
/// converges on its own view.
pub struct ProviderHealth {
    providers: Mutex<HashMap<String, ProviderState>>,
    breaker_threshold: u32,
    breaker_window: Duration,
}

impl ProviderHealth {
    pub fn new(breaker_threshold: u32, breaker_window: Duration) -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
            breaker_threshold: breaker_threshold.max(1),
            breaker_window,
        }
    }

    pub fn register(&self, provider: &str, cost_per_token: f64) {
        self.providers
            .lock()
            .entry(provider.to_string())
            .or_insert_with(|| ProviderState {
                metrics: ProviderMetrics::new(cost_per_token),
                circuit: Circuit::default(),
            });
    }

    pub fn is_available(&self, provider: &str) -> bool {
        let now = Instant::now();
        self.providers
            .lock()
            .get(provider)
            .is_none_or(|state| !state.circuit.is_open(now, self.breaker_window))
    }

    pub fn record_success(&self, provider: &str, latency: Duration) {
        let mut providers = self.providers.lock();
        let state = Self::state_mut(&mut providers, provider);
        state.metrics.observe(latency, true);
        state.circuit.reset();
    }

    pub fn record_failure(&self, provider: &str, latency: Duration) {
        let now = Instant::now();
        let mut providers = self.providers.lock();
        let state = Self::state_mut(&mut providers, provider);
        state.metrics.observe(latency, false);
        let was_open = state.circuit.opened_at.is_some();
        state
            .circuit
            .record_failure(now, self.breaker_threshold, self.breaker_window);
        if !was_open && state.circuit.opened_at.is_some() {
            tracing::warn!(
                provider = provider,
                failures = state.circuit.consecutive_failures,
                window_ms = self.breaker_window.as_millis() as u64,
                "Circuit opened for provider"
            );
        }
    }

    pub fn metrics(&self, provider: &str) -> Option<ProviderMetrics> {
        self.providers
            .lock()
            .get(provider)
            .map(|state| state.metrics.clone())
    }

    pub fn circuit(&self, provider: &str) -> Option<CircuitSnapshot> {
        let now = Instant::now();
        self.providers.lock().get(provider).map(|state| CircuitSnapshot {
            consecutive_failures: state.circuit.consecutive_failures,
            open: state.circuit.is_open(now, self.breaker_window),
        })
    }

    pub fn snapshot(&self) -> HashMap<String, ProviderMetrics> {
        self.providers
            .lock()
            .iter()
            .map(|(name, state)| (name.clone(), state.metrics.clone()))
            .collect()
    }

    fn state_mut<'a>(
        providers: &'a mut HashMap<String, ProviderState>,
        provider: &str,
    ) -> &'a mut ProviderState {
        providers
            .entry(provider.to_string())
            .or_insert_with(|| ProviderState {
                metrics: ProviderMetrics::new(0.0),
                circuit: Circuit::default(),
            })
    }
}
