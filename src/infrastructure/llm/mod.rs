mod embedder_factory;
mod gemini_provider;
mod http_errors;
mod openai_embedder;
mod openai_provider;
mod provider_factory;

pub use embedder_factory::EmbedderFactory;
pub use gemini_provider::{GEMINI_BASE_URL, GeminiProvider};
pub use openai_embedder::OpenAiEmbedder;
pub use openai_provider::{OpenAiAuth, OpenAiProvider};
pub use provider_factory::{ProviderFactory, ProviderFactoryError};
