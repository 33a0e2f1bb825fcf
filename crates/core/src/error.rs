//! Error types for the pinchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! `ChatError` is the per-request outcome taxonomy surfaced to browsers;
//! `AdapterError` describes transport-level failures of the adapter call.

use thiserror::Error;

/// Terminal failure of one chat request.
///
/// Every variant has a stable machine-readable code that the HTTP layer
/// sends as `{"error": code}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    // --- Client errors ---
    #[error("missing or expired session")]
    Unauthorized,

    #[error("message is empty")]
    Empty,

    #[error("message exceeds {limit} characters")]
    TooLong { limit: usize },

    #[error("sending too fast, wait for the cooldown")]
    Cooldown,

    #[error("daily request limit of {limit} reached")]
    DailyLimit { limit: u64 },

    // --- Upstream errors ---
    #[error("language model adapter unreachable")]
    LlmUnreachable,

    #[error("language model adapter returned HTTP {status_code}")]
    LlmError { status_code: u16 },

    /// The adapter answered but reported its own failure indicator.
    #[error("language model adapter failed: {code}")]
    LlmFailed { code: String },

    #[error("language model adapter returned no usable text")]
    LlmInvalid,
}

impl ChatError {
    /// Build an `LlmFailed` from the adapter's indicator, falling back to
    /// `llm_failed` when the indicator is blank.
    pub fn llm_failed(indicator: Option<&str>) -> Self {
        let code = indicator
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("llm_failed");
        ChatError::LlmFailed { code: code.to_string() }
    }

    /// Stable error code sent to the client.
    pub fn code(&self) -> &str {
        match self {
            ChatError::Unauthorized => "unauthorized",
            ChatError::Empty => "empty",
            ChatError::TooLong { .. } => "too_long",
            ChatError::Cooldown => "cooldown",
            ChatError::DailyLimit { .. } => "daily_limit",
            ChatError::LlmUnreachable => "llm_unreachable",
            ChatError::LlmError { .. } => "llm_error",
            ChatError::LlmFailed { code } => code,
            ChatError::LlmInvalid => "llm_invalid",
        }
    }

    /// HTTP status code for this outcome.
    pub fn http_status(&self) -> u16 {
        match self {
            ChatError::Unauthorized => 403,
            ChatError::Empty | ChatError::TooLong { .. } => 400,
            ChatError::Cooldown | ChatError::DailyLimit { .. } => 429,
            ChatError::LlmUnreachable
            | ChatError::LlmError { .. }
            | ChatError::LlmFailed { .. }
            | ChatError::LlmInvalid => 502,
        }
    }

    /// Whether the failure is attributed to the external adapter.
    pub fn is_upstream(&self) -> bool {
        self.http_status() == 502
    }
}

impl From<AdapterError> for ChatError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Unreachable(_) => ChatError::LlmUnreachable,
            AdapterError::Status { status_code, .. } => ChatError::LlmError { status_code },
            AdapterError::InvalidBody(_) => ChatError::LlmInvalid,
        }
    }
}

/// Transport-level failure talking to the adapter service.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Connect failure, timeout, or broken connection.
    #[error("adapter unreachable: {0}")]
    Unreachable(String),

    #[error("adapter returned status {status_code}: {body}")]
    Status { status_code: u16, body: String },

    /// Success status but the body was not a reply object.
    #[error("adapter returned an unreadable body: {0}")]
    InvalidBody(String),
}
