mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    CacheSettings, CrmSettings, DatabaseSettings, EmbeddingsSettings, FeatureFlags,
    LoggingSettings, MetricsSettings, ProcessingSettings, ProviderKind, ProviderSettings,
    QueueSettings, RouterSettings, ScoringSettings, ServerSettings, Settings, SettingsError,
    StorageProvider, StorageSettings, TranscriptionProvider, TranscriptionSettings,
    WebhookSettings,
};
