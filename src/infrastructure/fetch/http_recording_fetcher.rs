use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::application::ports::{FetchError, FetchedRecording, RecordingFetcher};

/// Downloads recordings over HTTP(S), refusing bodies above `max_bytes`.
pub struct HttpRecordingFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpRecordingFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: u64) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }
}

#[async_trait]
impl RecordingFetcher for HttpRecordingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedRecording, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(FetchError::TooLarge(length));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(FetchError::TooLarge(body.len() as u64 + chunk.len() as u64));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(bytes = body.len(), content_type = ?content_type, "Recording downloaded");
        Ok(FetchedRecording {
            data: body.freeze(),
            content_type,
        })
    }
}

impl HttpRecordingFetcher {
    fn transport_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::RequestFailed(error.to_string())
        }
    }
}
