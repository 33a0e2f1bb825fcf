//! HTTP gateway for pinchat.
//!
//! Serves the login and chat pages plus a small JSON API. All shared
//! state lives in [`GatewayState`]; handlers receive it through Axum's
//! `State` extractor.

pub mod api;
pub mod auth;
pub mod frontend;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;

use pinchat_adapter::HttpAdapter;
use pinchat_chat::{ChatLimits, ChatService, SystemPrompt};
use pinchat_config::{AppConfig, ConfigError};
use pinchat_core::Adapter;
use pinchat_ledger::{LockoutPolicy, UsageLedger};
use pinchat_security::{AuditLogger, PinVerifier, SessionManager};

/// Smallest request body limit, whatever the input limit.
const MIN_BODY_BYTES: usize = 64 * 1024;
/// Room for the JSON envelope around the message text.
const BODY_OVERHEAD_BYTES: usize = 1024;
/// Worst case per character: a JSON-escaped surrogate pair (`\uXXXX\uXXXX`).
const MAX_BYTES_PER_CHAR: usize = 12;

/// Request body limit that admits any message of up to `max_input_chars`
/// characters however the client encodes it.
pub fn body_limit(max_input_chars: usize) -> usize {
    max_input_chars
        .saturating_mul(MAX_BYTES_PER_CHAR)
        .saturating_add(BODY_OVERHEAD_BYTES)
        .max(MIN_BODY_BYTES)
}

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub sessions: Arc<SessionManager>,
    pub ledger: Arc<UsageLedger>,
    pub pin: PinVerifier,
    pub chat: ChatService,
    pub audit: AuditLogger,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Wire every subsystem from `config` around the given adapter.
    pub fn new(config: AppConfig, adapter: Arc<dyn Adapter>) -> Result<Self, ConfigError> {
        let timezone = config.tz()?;
        let sessions = Arc::new(SessionManager::new(config.session_ttl()));
        let ledger = Arc::new(UsageLedger::new(
            config.ledger_path.clone(),
            LockoutPolicy {
                max_failures: config.lockout.max_failures,
                duration: config.lockout_duration(),
            },
        ));

        let mut chat = ChatService::new(
            adapter,
            sessions.clone(),
            ledger.clone(),
            ChatLimits::from_config(&config),
        );
        if let Some(template) = &config.system_prompt {
            chat = chat.with_system_prompt(SystemPrompt::new(
                template.clone(),
                config.app_name.clone(),
                timezone,
            ));
        }

        Ok(Self {
            pin: PinVerifier::new(&config.pin),
            sessions,
            ledger,
            chat,
            audit: AuditLogger::tracing(),
            config,
        })
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: SharedState) -> Router {
    let limit = body_limit(state.config.max_input_chars);
    Router::new()
        .route("/", get(auth::index_handler))
        .route(
            "/login",
            get(auth::login_page_handler).post(auth::login_handler),
        )
        .route("/chat", get(auth::chat_page_handler))
        .route("/api/chat", post(api::chat_handler))
        .route("/api/lock", post(auth::lock_handler))
        .route("/api/usage", get(api::usage_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let adapter = HttpAdapter::new(config.llm_adapter_url.clone(), config.llm_timeout())?;
    info!(url = %adapter.url(), "Using LLM adapter");

    let state = Arc::new(GatewayState::new(config, Arc::new(adapter))?);
    let app = build_router(state.clone());

    info!(addr = %addr, ledger = %state.ledger.path().display(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let dropped = state.sessions.drain();
    info!(sessions = dropped, "Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
