use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use super::{GeminiProvider, OpenAiAuth, OpenAiProvider};
use crate::application::ports::LlmProvider;
use crate::presentation::config::{ProviderKind, ProviderSettings};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const AZURE_API_VERSION: &str = "2024-06-01";

#[derive(Debug, thiserror::Error)]
pub enum ProviderFactoryError {
    #[error("provider '{0}' requires an api_key")]
    MissingApiKey(String),
    #[error("provider '{0}' requires base_url")]
    MissingBaseUrl(String),
    #[error("provider '{0}' requires azure_endpoint")]
    MissingAzureEndpoint(String),
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// Builds every configured provider, in name order, over one shared client.
    pub fn create_all<'a>(
        client: &Client,
        providers: impl IntoIterator<Item = (&'a String, &'a ProviderSettings)>,
    ) -> Result<Vec<Arc<dyn LlmProvider>>, ProviderFactoryError> {
        providers
            .into_iter()
            .map(|(name, settings)| Self::create(client.clone(), name, settings))
            .collect()
    }

    pub fn create(
        client: Client,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn LlmProvider>, ProviderFactoryError> {
        let timeout = settings.timeout_ms.map(Duration::from_millis);
        let require_key = || {
            if settings.api_key.is_empty() {
                Err(ProviderFactoryError::MissingApiKey(name.to_string()))
            } else {
                Ok(settings.api_key.clone())
            }
        };

        let provider: Arc<dyn LlmProvider> = match settings.kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                client,
                name.to_string(),
                settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                require_key()?,
                OpenAiAuth::Bearer,
                settings.model.clone(),
                settings.cost_per_token,
                timeout,
            )),
            ProviderKind::LmStudio => Arc::new(OpenAiProvider::new(
                client,
                name.to_string(),
                settings
                    .base_url
                    .clone()
                    .ok_or_else(|| ProviderFactoryError::MissingBaseUrl(name.to_string()))?,
                settings.api_key.clone(),
                OpenAiAuth::Bearer,
                settings.model.clone(),
                settings.cost_per_token,
                timeout,
            )),
            ProviderKind::Azure => {
                let endpoint = settings
                    .azure_endpoint
                    .as_ref()
                    .ok_or_else(|| ProviderFactoryError::MissingAzureEndpoint(name.to_string()))?;
                let base_url = format!(
                    "{}/openai/deployments/{}",
                    endpoint.trim_end_matches('/'),
                    settings.model
                );
                Arc::new(
                    OpenAiProvider::new(
                        client,
                        name.to_string(),
                        base_url,
                        require_key()?,
                        OpenAiAuth::ApiKeyHeader,
                        settings.model.clone(),
                        settings.cost_per_token,
                        timeout,
                    )
                    .with_query(&[("api-version", AZURE_API_VERSION)]),
                )
            }
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(
                client,
                name.to_string(),
                settings.base_url.clone(),
                require_key()?,
                settings.model.clone(),
                settings.cost_per_token,
                timeout,
            )),
        };

        tracing::info!(provider = name, kind = ?settings.kind, model = %settings.model, "Configured LLM provider");
        Ok(provider)
    }
}
