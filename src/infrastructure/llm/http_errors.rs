use std::time::Duration;

use crate::application::ports::ProviderError;

/// Classifies a transport-level reqwest failure.
pub(crate) fn classify_transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if error.is_decode() {
        ProviderError::MalformedResponse(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Turns a non-success response into the matching error class.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::from_status(status, truncate(body))
}

fn truncate(mut body: String) -> String {
    const MAX_BODY_CHARS: usize = 512;
    if let Some((index, _)) = body.char_indices().nth(MAX_BODY_CHARS) {
        body.truncate(index);
    }
    body
}
