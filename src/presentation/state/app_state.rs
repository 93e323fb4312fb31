use std::sync::Arc;

use crate::application::ports::Embedder;
use crate::application::services::{CallQueryService, WebhookIngestionService};
use crate::presentation::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub ingestion_service: Arc<WebhookIngestionService>,
    pub query_service: Arc<CallQueryService>,
    pub settings: Arc<Settings>,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl AppState {
    pub fn new(
        ingestion_service: Arc<WebhookIngestionService>,
        query_service: Arc<CallQueryService>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            ingestion_service,
            query_service,
            settings,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        self.embedder = embedder;
        self
    }
}
