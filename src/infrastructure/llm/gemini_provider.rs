use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http_errors::{classify_transport_error, error_from_response};
use crate::application::ports::{
    GenerationOutput, GenerationRequest, JSON_MIME_TYPE, LlmProvider, ProviderError, extract_json,
};
use crate::infrastructure::observability::sanitize_prompt;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Google Gemini `generateContent` provider.
pub struct GeminiProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    cost_per_token: f64,
    timeout: Option<Duration>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        name: String,
        base_url: Option<String>,
        api_key: String,
        model: String,
        cost_per_token: f64,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            name,
            base_url: base_url
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            cost_per_token,
            timeout,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
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
        tracing::debug!(provider = %self.name, prompt = %sanitize_prompt(&request.prompt), "Sending generateContent");

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request.wants_json().then_some(JSON_MIME_TYPE),
                response_json_schema: request.response_schema.as_ref(),
            },
        };

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if parsed.candidates.is_empty() {
            if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ProviderError::Rejected {
                    status: 200,
                    body: format!("prompt blocked: {}", reason),
                });
            }
            return Err(ProviderError::MalformedResponse("no candidates".to_string()));
        }

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("empty candidate".to_string()));
        }

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
            model: parsed.model_version.unwrap_or_else(|| self.model.clone()),
            input_tokens: parsed.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            output_tokens: parsed
                .usage_metadata
                .as_ref()
                .and_then(|u| u.candidates_token_count),
        })
    }
}
