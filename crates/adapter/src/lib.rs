//! LLM adapter client for pinchat.
//!
//! Implements the `pinchat_core::Adapter` trait over HTTP. The adapter
//! service owns model selection; this crate only ships the context window
//! and classifies what comes back.

pub mod http;

pub use http::HttpAdapter;
