//! The chat request pipeline.
//!
//! Each step either passes or ends the request with a [`ChatError`]:
//!
//! 1. authenticate the session token
//! 2. validate the input text
//! 3. cooldown since this session's last send attempt
//! 4. daily quota, checked before the expensive call
//! 5. record the attempt (`last_sent_at = now`)
//! 6. append the user message and snapshot the context window
//! 7. call the adapter, with no lock held
//! 8. append the reply and count the request
//!
//! Steps 3–6 run under one acquisition of the session lock, so concurrent
//! requests on one session cannot both slip past the cooldown. The ledger
//! is only ever locked inside a session lock, never the other way round.

use chrono::{DateTime, Duration, Utc};
use pinchat_config::AppConfig;
use pinchat_core::adapter::{Adapter, AdapterRequest};
use pinchat_core::error::ChatError;
use pinchat_core::message::{ChatMessage, Role};
use pinchat_ledger::UsageLedger;
use pinchat_security::session::{SessionError, SessionManager, token_prefix};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompt::SystemPrompt;

/// Per-request limits.
#[derive(Debug, Clone)]
pub struct ChatLimits {
    pub max_input_chars: usize,
    pub max_context_messages: usize,
    pub cooldown: Duration,
    pub daily_limit: u64,
    pub max_output_tokens: u32,
}

impl ChatLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_input_chars: config.max_input_chars,
            max_context_messages: config.max_context_messages,
            cooldown: config.cooldown(),
            daily_limit: config.daily_limit,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Successful chat response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub model_used: String,
}

/// Orchestrates one chat turn across sessions, ledger, and adapter.
pub struct ChatService {
    adapter: Arc<dyn Adapter>,
    sessions: Arc<SessionManager>,
    ledger: Arc<UsageLedger>,
    limits: ChatLimits,
    system_prompt: Option<SystemPrompt>,
}

impl ChatService {
    pub fn new(
        adapter: Arc<dyn Adapter>,
        sessions: Arc<SessionManager>,
        ledger: Arc<UsageLedger>,
        limits: ChatLimits,
    ) -> Self {
        Self {
            adapter,
            sessions,
            ledger,
            limits,
            system_prompt: None,
        }
    }

    /// Prepend a rendered system message to every adapter request.
    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn limits(&self) -> &ChatLimits {
        &self.limits
    }

    /// Handle one chat message from the session identified by `token`.
    pub async fn send(
        &self,
        token: &str,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let handle = self
            .sessions
            .validate(token, now)
            .map_err(|_| ChatError::Unauthorized)?;

        let text = input.trim();
        if text.is_empty() {
            return Err(ChatError::Empty);
        }
        if text.chars().count() > self.limits.max_input_chars {
            return Err(ChatError::TooLong {
                limit: self.limits.max_input_chars,
            });
        }

        let context = {
            let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(last) = session.last_sent_at {
                if now - last < self.limits.cooldown {
                    debug!(session = %token_prefix(token), "Send rejected by cooldown");
                    return Err(ChatError::Cooldown);
                }
            }

            let used = self.ledger.daily_count(now);
            if used >= self.limits.daily_limit {
                info!(used, limit = self.limits.daily_limit, "Daily limit reached");
                return Err(ChatError::DailyLimit {
                    limit: self.limits.daily_limit,
                });
            }

            session.last_sent_at = Some(now);
            session.push_trimmed(ChatMessage::user(text), self.limits.max_context_messages);
            session.messages().to_vec()
        };

        let request = AdapterRequest {
            messages: self.build_context(context, now),
            max_tokens: self.limits.max_output_tokens,
        };

        let reply = self.adapter.generate(request).await.map_err(|e| {
            warn!(adapter = %self.adapter.name(), error = %e, "Adapter call failed");
            ChatError::from(e)
        })?;

        let answer = match reply.usable_text() {
            Some(text) => text.to_string(),
            None if reply.error_type.is_some() => {
                let err = ChatError::llm_failed(reply.error_type.as_deref());
                warn!(code = %err.code(), "Adapter reported failure");
                return Err(err);
            }
            None => {
                warn!("Adapter returned no text");
                return Err(ChatError::LlmInvalid);
            }
        };

        if let Err(SessionError::NotFound) = self.sessions.append_message(
            token,
            ChatMessage::assistant(answer.clone()),
            self.limits.max_context_messages,
        ) {
            debug!(session = %token_prefix(token), "Session ended before reply was stored");
        }

        let count = self.ledger.increment_daily(now);
        let model_used = reply.model_used.unwrap_or_else(|| "unknown".into());
        info!(
            session = %token_prefix(token),
            model = %model_used,
            daily_count = count,
            "Chat reply delivered"
        );

        Ok(ChatReply {
            text: answer,
            model_used,
        })
    }

    /// Prepend the rendered system prompt unless the context already
    /// carries a system message.
    pub fn build_context(&self, mut messages: Vec<ChatMessage>, now: DateTime<Utc>) -> Vec<ChatMessage> {
        if let Some(prompt) = &self.system_prompt {
            if !messages.iter().any(|m| m.role == Role::System) {
                messages.insert(0, ChatMessage::system(prompt.render(now)));
            }
        }
        messages
    }
}
