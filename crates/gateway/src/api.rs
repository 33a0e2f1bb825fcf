//! JSON API: `/api/chat` and `/api/usage`.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pinchat_chat::ChatReply;
use pinchat_core::ChatError;

use crate::{SharedState, auth::session_token};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub date: String,
    pub count: u64,
    pub limit: u64,
}

/// A [`ChatError`] rendered as `{"error": "<code>"}` with its HTTP status.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_upstream() {
            warn!(error = %self.0, "Upstream failure");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.code().to_string(),
            }),
        )
            .into_response()
    }
}

/// `POST /api/chat`
///
/// An unreadable body is answered like any other chat error: `unauthorized`
/// without a session, `too_long` past the body limit, otherwise `empty`.
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let token = session_token(&headers).unwrap_or_default();
    let input = match body {
        Ok(Json(req)) => req.input,
        Err(rejection) => {
            state
                .sessions
                .validate(&token, Utc::now())
                .map_err(|_| ApiError(ChatError::Unauthorized))?;
            debug!(status = %rejection.status(), reason = %rejection.body_text(), "Unreadable chat body");
            return Err(ApiError(
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ChatError::TooLong {
                        limit: state.config.max_input_chars,
                    }
                } else {
                    ChatError::Empty
                },
            ));
        }
    };

    let reply = state.chat.send(&token, &input, Utc::now()).await?;
    Ok(Json(reply))
}

/// `GET /api/usage`: today's count against the daily limit.
pub async fn usage_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, ApiError> {
    let now = Utc::now();
    session_token(&headers)
        .and_then(|token| state.sessions.validate(&token, now).ok())
        .ok_or(ApiError(ChatError::Unauthorized))?;

    Ok(Json(UsageResponse {
        date: now.format("%Y-%m-%d").to_string(),
        count: state.ledger.daily_count(now),
        limit: state.config.daily_limit,
    }))
}
