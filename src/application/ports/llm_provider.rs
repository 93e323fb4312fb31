use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::Stream;

pub const JSON_MIME_TYPE: &str = "application/json";

pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<serde_json::Value>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_mime_type = Some(JSON_MIME_TYPE.to_string());
        self.response_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn wants_json(&self) -> bool {
        self.response_schema.is_some()
            || self
                .response_mime_type
                .as_deref()
                .is_some_and(|mime| mime.eq_ignore_ascii_case(JSON_MIME_TYPE))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub json: Option<serde_json::Value>,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl GenerationOutput {
    pub fn total_tokens(&self) -> Option<u32> {
        match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0) + output.unwrap_or(0)),
        }
    }
}

/// One vendor's text-generation endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Blended price per token, used by cost-aware routing.
    fn cost_per_token(&self) -> f64;

    /// Per-provider attempt timeout; the router default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn generate(&self, request: &GenerationRequest)
    -> Result<GenerationOutput, ProviderError>;

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextChunkStream, ProviderError> {
        let output = self.generate(request).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(output.text)
        })))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("server error HTTP {status}: {body}")]
    Server { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unauthorized HTTP {status}: {body}")]
    Unauthorized { status: u16, body: String },
    #[error("request rejected HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("schema validation failed: {0}")]
    SchemaMismatch(String),
    #[error("configuration: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Whether repeating the same request against the same provider may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::Server { .. }
                | ProviderError::Network(_)
                | ProviderError::MalformedResponse(_)
        )
    }

    /// Maps a non-success HTTP status to the matching error class.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ProviderError::RateLimited(body),
            401 | 403 => ProviderError::Unauthorized { status, body },
            500..=599 => ProviderError::Server { status, body },
            _ => ProviderError::Rejected { status, body },
        }
    }
}
