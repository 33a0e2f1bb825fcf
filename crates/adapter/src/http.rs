//! HTTP adapter client.
//!
//! Posts `{"messages": [...], "max_tokens": N}` to the configured endpoint
//! and reads back `{"text", "model_used", "error_type"}`. No retries: a
//! failed call is reported once and the user decides whether to resend.

use async_trait::async_trait;
use pinchat_core::adapter::{Adapter, AdapterReply, AdapterRequest};
use pinchat_core::error::AdapterError;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the external adapter's generate endpoint.
pub struct HttpAdapter {
    url: String,
    client: reqwest::Client,
}

impl HttpAdapter {
    /// Create a new adapter client.
    ///
    /// `timeout` bounds the whole call (connect + response); hitting it is
    /// reported as [`AdapterError::Unreachable`].
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: AdapterRequest) -> Result<AdapterReply, AdapterError> {
        debug!(
            url = %self.url,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending generate request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Unreachable(format!("timed out: {e}"))
                } else {
                    AdapterError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Adapter returned error status");
            return Err(AdapterError::Status {
                status_code: status.as_u16(),
                body,
            });
        }

        // Read the body as bytes first so a timeout while streaming the body
        // stays a transport failure rather than a parse failure.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AdapterError::Unreachable(e.to_string()))?;

        serde_json::from_slice::<AdapterReply>(&bytes)
            .map_err(|e| AdapterError::InvalidBody(e.to_string()))
    }
}
