//! Adapter trait: the abstraction over the external language-model service.
//!
//! The relay never talks to a model vendor directly. It hands the trimmed
//! context window to an adapter service, which picks a model and answers
//! with either text or an error indicator.
//!
//! Implementations: `pinchat_adapter::HttpAdapter` in production, scripted
//! mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::message::ChatMessage;

/// Body sent to the adapter's generate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRequest {
    /// The context window, oldest first
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,
}

/// A successfully received adapter response.
///
/// Every field is optional: the adapter reports its own failures in-band
/// through `error_type` with a success status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Which model actually answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,

    /// Adapter-side failure indicator (e.g. `timeout`, `rate_limited`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl AdapterReply {
    /// Convenience constructor for a reply carrying text.
    pub fn text(text: impl Into<String>, model_used: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            model_used: Some(model_used.into()),
            error_type: None,
        }
    }

    /// Convenience constructor for an in-band adapter failure.
    pub fn error(error_type: impl Into<String>) -> Self {
        Self {
            text: None,
            model_used: None,
            error_type: Some(error_type.into()),
        }
    }

    /// The reply text, if present and not blank.
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// The core Adapter trait.
///
/// Calls may be slow and may fail; implementations must not retry on their
/// own. Callers must not hold any lock across `generate`.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// A human-readable name for logs (e.g. "http").
    fn name(&self) -> &str;

    /// Send the context window and wait for the model's reply.
    async fn generate(&self, request: AdapterRequest) -> Result<AdapterReply, AdapterError>;
}
