use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::http_errors::{classify_transport_error, error_from_response};
use crate::application::ports::{
    GenerationOutput, GenerationRequest, LlmProvider, ProviderError, TextChunkStream,
    extract_json,
};
use crate::infrastructure::observability::sanitize_prompt;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiAuth {
    /// `Authorization: Bearer …` (OpenAI, LM Studio).
    Bearer,
    /// `api-key: …` (Azure OpenAI deployments).
    ApiKeyHeader,
}

/// Chat-completions provider for OpenAI and compatible endpoints.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    auth: OpenAiAuth,
    model: String,
    cost_per_token: f64,
    timeout: Option<Duration>,
    query: Vec<(String, String)>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        name: String,
        base_url: String,
        api_key: String,
        auth: OpenAiAuth,
        model: String,
        cost_per_token: f64,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            auth,
            model,
            cost_per_token,
            timeout,
            query: Vec::new(),
        }
    }

    /// Extra query parameters sent with every request.
    pub fn with_query(mut self, params: &[(&str, &str)]) -> Self {
        self.query = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    fn build_body<'a>(&'a self, request: &'a GenerationRequest, stream: bool) -> ChatCompletionRequest<'a> {
        let response_format = match (&request.response_schema, request.wants_json()) {
            (Some(schema), _) => Some(json!({
                "type": "json_schema",
                "json_schema": { "name": "response", "schema": schema },
            })),
            (None, true) => Some(json!({ "type": "json_object" })),
            (None, false) => None,
        };
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
            response_format,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .query(&self.query)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .json(body);
        let request = match self.auth {
            OpenAiAuth::Bearer => request.bearer_auth(&self.api_key),
            OpenAiAuth::ApiKeyHeader => request.header("api-key", &self.api_key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout.unwrap_or(DEFAULT_TIMEOUT)))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> f64 {
        self.cost_per_token
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        tracing::debug!(provider = %self.name, prompt = %sanitize_prompt(&request.prompt), "Sending chat completion");

        let response = self.send(&self.build_body(request, false)).await?;
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("empty choices".to_string()))?;

        let json = if request.wants_json() {
            Some(extract_json(&text).ok_or_else(|| {
                ProviderError::MalformedResponse("response is not valid JSON".to_string())
            })?)
        } else {
            None
        };

        Ok(GenerationOutput {
            text,
            json,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            input_tokens: completion.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: completion.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextChunkStream, ProviderError> {
        let response = self.send(&self.build_body(request, true)).await?;

        let chunks = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), |buffer, chunk| {
                let items = match chunk {
                    Ok(bytes) => drain_sse_lines(buffer, &bytes),
                    Err(e) => vec![Err(ProviderError::Network(e.to_string()))],
                };
                futures::future::ready(Some(stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(chunks))
    }
}

/// Appends `bytes` and returns the content deltas of every complete `data:` line.
/// Partial lines stay buffered until the rest arrives.
fn drain_sse_lines(buffer: &mut Vec<u8>, bytes: &Bytes) -> Vec<Result<String, ProviderError>> {
    buffer.extend_from_slice(bytes);
    let mut deltas = Vec::new();

    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(data) = line.trim_end().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => {
                if let Some(content) = chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
                    if !content.is_empty() {
                        deltas.push(Ok(content));
                    }
                }
            }
            Err(e) => deltas.push(Err(ProviderError::MalformedResponse(e.to_string()))),
        }
    }
    deltas
}
