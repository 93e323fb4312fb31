use std::collections::BTreeMap;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use super::Environment;
use crate::application::services::{
    DEFAULT_BATCH_SIZE, DEFAULT_CACHE_TTL, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_LOCAL_ENTRIES,
    DEFAULT_MAX_TRANSCRIPT_CHARS, RouterConfig, RoutingMode,
};
use crate::infrastructure::observability::DEFAULT_LOG_FILTER;
use crate::domain::ScorecardTemplate;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{0}")]
    Environment(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Process configuration, loaded once at boot and shared read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub embeddings: EmbeddingsSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub crm: CrmSettings,
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Read by the external retention job; nothing here deletes data.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub max_attempts: u32,
    pub visibility_timeout_secs: u64,
    pub retry_backoff_secs: u64,
    pub poll_interval_ms: u64,
    pub worker_concurrency: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            visibility_timeout_secs: 300,
            retry_backoff_secs: 30,
            poll_interval_ms: 1_000,
            worker_concurrency: 2,
        }
    }
}

impl QueueSettings {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Azure,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub provider: StorageProvider,
    pub local_path: String,
    pub azure_account: Option<String>,
    pub azure_access_key: Option<String>,
    pub azure_container: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            local_path: "./data/objects".to_string(),
            azure_account: None,
            azure_access_key: None,
            azure_container: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub mode: RoutingMode,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub retry_max: u32,
    pub attempt_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub cb_threshold: u32,
    pub cb_window_secs: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            mode: RoutingMode::PrimaryFallback,
            primary: None,
            secondary: None,
            retry_max: 1,
            attempt_timeout_ms: 30_000,
            backoff_base_ms: 300,
            cb_threshold: 3,
            cb_window_secs: 60,
        }
    }
}

impl RouterSettings {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            mode: self.mode,
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            retry_max: self.retry_max,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }

    pub fn breaker_window(&self) -> Duration {
        Duration::from_secs(self.cb_window_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Azure,
    #[serde(rename = "lmstudio")]
    LmStudio,
    Gemini,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default)]
    pub cost_per_token: f64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub diarize: bool,
    pub timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Disabled,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            diarize: false,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingsSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingsSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    pub ttl_secs: u64,
    pub max_local_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            max_local_entries: DEFAULT_MAX_LOCAL_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Enables `POST /api/v1/calls/{id}/crm-push`.
    pub crm_push: bool,
    /// Pushes every processed call to the CRM from the worker.
    pub crm_auto_push: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrmSettings {
    pub target: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            target: "crm".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub language: String,
    pub locale: String,
    pub fetch_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
    pub max_recording_bytes: u64,
    pub max_transcript_chars: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            locale: "en-US".to_string(),
            fetch_timeout_secs: 60,
            analysis_timeout_secs: 120,
            max_recording_bytes: 200 * 1024 * 1024,
            max_transcript_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub template: ScorecardTemplate,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            template: ScorecardTemplate {
                key: "default".to_string(),
                items: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Loads `.env`, then `appsettings.{env}.toml` (optional), then
    /// `APP__SECTION__KEY` variables, and validates the result.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        let environment = Environment::from_env().map_err(SettingsError::Environment)?;

        let settings: Settings = Config::builder()
            .add_source(File::with_name(&environment.config_file()).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.webhook.secret.trim().is_empty() {
            return Err(SettingsError::Invalid("webhook.secret must be set".to_string()));
        }
        if self.providers.is_empty() {
            return Err(SettingsError::Invalid(
                "at least one entry under providers is required".to_string(),
            ));
        }
        for name in [&self.router.primary, &self.router.secondary]
            .into_iter()
            .flatten()
        {
            if !self.providers.contains_key(name) {
                return Err(SettingsError::Invalid(format!(
                    "router refers to unknown provider '{}'",
                    name
                )));
            }
        }
        for (name, provider) in &self.providers {
            if provider.cost_per_token < 0.0 {
                return Err(SettingsError::Invalid(format!(
                    "providers.{}.cost_per_token must not be negative",
                    name
                )));
            }
        }
        if let Some(item) = self
            .scoring
            .template
            .items
            .iter()
            .find(|item| !(item.weight > 0.0))
        {
            return Err(SettingsError::Invalid(format!(
                "scoring weight for '{}' must be positive",
                item.key
            )));
        }
        if self.queue.max_attempts == 0 {
            return Err(SettingsError::Invalid("queue.max_attempts must be at least 1".to_string()));
        }
        if self.metrics.enabled && self.metrics.flush_interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "metrics.flush_interval_ms must be positive".to_string(),
            ));
        }
        if (self.features.crm_push || self.features.crm_auto_push) && self.crm.endpoint.is_none() {
            return Err(SettingsError::Invalid(
                "crm.endpoint is required when a CRM feature is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
