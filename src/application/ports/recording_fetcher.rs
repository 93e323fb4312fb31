use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct FetchedRecording {
    pub data: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedRecording, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("recording too large: {0} bytes")]
    TooLarge(u64),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
