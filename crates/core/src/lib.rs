//! # pinchat core
//!
//! Domain types, traits, and error definitions for the pinchat relay.
//! This crate has **zero framework dependencies**: it defines the model
//! that the ledger, session, chat, and gateway crates implement against.
//!
//! The external language-model service is reached only through the
//! [`Adapter`] trait, so the orchestrator can be tested with scripted
//! adapters and run against the real HTTP client in production.

pub mod adapter;
pub mod error;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use adapter::{Adapter, AdapterReply, AdapterRequest};
pub use error::{AdapterError, ChatError};
pub use message::{ChatMessage, Role};
