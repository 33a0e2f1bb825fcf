//! Chat orchestration for pinchat.
//!
//! [`ChatService`] turns one browser message into one adapter call:
//! authenticate, validate, enforce cooldown and the daily quota, build the
//! context window, call the adapter, and commit the reply.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{ChatLimits, ChatReply, ChatService};
pub use prompt::SystemPrompt;
