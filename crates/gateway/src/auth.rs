//! PIN login, session cookies, and logout.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use pinchat_security::{AuditEvent, AuditOutcome, token_prefix};

use crate::{SharedState, frontend};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "pinchat_session";

const WRONG_PIN: &str = "Wrong PIN. Please try again.";
const LOCKED_OUT: &str = "Too many wrong attempts. Please wait a few minutes.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub pin: String,
}

/// Extract the session token from the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, ttl: Duration, now: DateTime<Utc>, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    );
    // Max-Age alone is enough when the expiry is not representable.
    if let Some(expires) = now.checked_add_signed(ttl) {
        cookie.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Best-effort client label for the audit log.
fn client_label(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

/// `GET /`: send the visitor wherever their session allows.
pub async fn index_handler(State(state): State<SharedState>, headers: HeaderMap) -> Redirect {
    let authenticated = session_token(&headers)
        .is_some_and(|token| state.sessions.validate(&token, Utc::now()).is_ok());
    if authenticated {
        Redirect::to("/chat")
    } else {
        Redirect::to("/login")
    }
}

/// `GET /login`
pub async fn login_page_handler(State(state): State<SharedState>) -> Html<String> {
    Html(frontend::login_page(&state.config.app_name, None))
}

/// `POST /login`: lockout check, PIN check, then session creation.
pub async fn login_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let now = Utc::now();
    let client = client_label(&headers);
    let app_name = &state.config.app_name;

    if state.ledger.auth_state().is_locked(now) {
        state
            .audit
            .log(AuditEvent::LockedOutAttempt, &client, AuditOutcome::Denied, None);
        return (
            StatusCode::FORBIDDEN,
            Html(frontend::login_page(app_name, Some(LOCKED_OUT))),
        )
            .into_response();
    }

    if !state.pin.verify(&form.pin) {
        let auth = state.ledger.record_failed_auth(now);
        state.audit.log(
            AuditEvent::Login,
            &client,
            AuditOutcome::Failure,
            Some(format!("consecutive failures: {}", auth.failed_count)),
        );
        if let Some(until) = auth.locked_until.filter(|_| auth.is_locked(now)) {
            warn!(until = %until, "PIN locked after repeated failures");
            state
                .audit
                .log(AuditEvent::Lockout { until }, &client, AuditOutcome::Denied, None);
        }
        return (
            StatusCode::UNAUTHORIZED,
            Html(frontend::login_page(app_name, Some(WRONG_PIN))),
        )
            .into_response();
    }

    state.ledger.reset_auth_failures();
    let token = state.sessions.create(now);
    state
        .audit
        .log(AuditEvent::Login, &client, AuditOutcome::Success, None);

    let cookie = session_cookie(
        &token,
        state.sessions.ttl(),
        now,
        state.config.gateway.cookie_secure,
    );
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/chat".to_string()), (header::SET_COOKIE, cookie)],
    )
        .into_response()
}

/// `GET /chat`
pub async fn chat_page_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let authenticated = session_token(&headers)
        .is_some_and(|token| state.sessions.validate(&token, Utc::now()).is_ok());
    if authenticated {
        Html(frontend::chat_page(&state.config.app_name)).into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

/// `POST /api/lock`: end the caller's session, if any.
pub async fn lock_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers)
        && state.sessions.destroy(&token)
    {
        state.audit.log(
            AuditEvent::Logout,
            &token_prefix(&token),
            AuditOutcome::Success,
            None,
        );
    }
    (
        [(header::SET_COOKIE, clear_cookie(state.config.gateway.cookie_secure))],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}
