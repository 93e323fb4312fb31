use async_trait::async_trait;
use serde_json::{Value, json};

use crate::application::ports::{CrmClient, CrmPushOutcome};
use crate::domain::CallId;

/// Posts call summaries to a CRM webhook endpoint.
pub struct HttpCrmClient {
    client: reqwest::Client,
    target: String,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCrmClient {
    pub fn new(
        client: reqwest::Client,
        target: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            target,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    fn target(&self) -> &str {
        &self.target
    }

    async fn push_call(&self, call_id: CallId, payload: &Value) -> CrmPushOutcome {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("idempotency-key", call_id.to_string())
            .json(&json!({ "call_id": call_id, "data": payload }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => CrmPushOutcome::sent(),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                CrmPushOutcome::error(format!("HTTP {}: {}", status, body))
            }
            Err(e) => CrmPushOutcome::error(e.to_string()),
        }
    }
}
