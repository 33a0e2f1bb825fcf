//! Session registry: authenticated browsers and their conversation state.
//!
//! Each session lives behind its own `Mutex`, so two chat requests on the
//! same session are serialized while unrelated sessions proceed in
//! parallel. The registry map itself is behind an `RwLock` that is only
//! held for lookups, inserts, and removals.
//!
//! Expiry is sliding: a successful [`SessionManager::validate`] refreshes
//! `last_active`, and a session is gone once `now - last_active > ttl`.
//! Stale sessions are swept opportunistically on every validation rather
//! than by a background task.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use pinchat_core::message::ChatMessage;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Random bytes per session token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Server-side state of one authenticated browser.
#[derive(Debug, Clone)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// When this session last attempted a send (successful or not)
    pub last_sent_at: Option<DateTime<Utc>>,
    messages: Vec<ChatMessage>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_active: now,
            last_sent_at: None,
            messages: Vec::new(),
        }
    }

    /// The retained context, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append `message`, then drop the oldest entries until at most
    /// `max_context` remain. Role is ignored when trimming.
    pub fn push_trimmed(&mut self, message: ChatMessage, max_context: usize) {
        self.messages.push(message);
        if self.messages.len() > max_context {
            let excess = self.messages.len() - max_context;
            self.messages.drain(..excess);
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active > ttl
    }
}

/// Shared, lockable reference to a live session.
pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found or expired")]
    NotFound,
}

/// The process-scoped session registry.
///
/// Created once at startup and injected into request handlers; dropped
/// (after [`drain`](Self::drain)) at shutdown.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .field("active", &self.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a new empty session and return its token.
    pub fn create(&self, now: DateTime<Utc>) -> String {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let token = loop {
            let candidate = generate_token();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        sessions.insert(token.clone(), Arc::new(Mutex::new(Session::new(now))));
        info!(session = %token_prefix(&token), active = sessions.len(), "Session created");
        token
    }

    /// Look up a live session and refresh its `last_active` to `now`.
    ///
    /// Expired sessions are removed and reported as [`SessionError::NotFound`].
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionHandle, SessionError> {
        self.sweep(now);

        let handle = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions.get(token).cloned()
        }
        .ok_or(SessionError::NotFound)?;

        let expired = {
            let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
            if session.is_expired(now, self.ttl) {
                true
            } else {
                session.last_active = now;
                false
            }
        };

        if expired {
            self.destroy(token);
            return Err(SessionError::NotFound);
        }

        Ok(handle)
    }

    /// Remove a session. Removing an unknown token is a no-op.
    pub fn destroy(&self, token: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
            .is_some();
        if removed {
            debug!(session = %token_prefix(token), "Session destroyed");
        }
        removed
    }

    /// Remove every session idle for longer than the TTL. Returns how many
    /// were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let stale: Vec<String> = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions
                .iter()
                .filter(|(_, handle)| {
                    handle
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .is_expired(now, self.ttl)
                })
                .map(|(token, _)| token.clone())
                .collect()
        };

        if stale.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for token in stale {
            // Re-check: a concurrent validate may have refreshed it.
            let still_stale = sessions.get(&token).is_some_and(|handle| {
                handle
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .is_expired(now, self.ttl)
            });
            if still_stale {
                sessions.remove(&token);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, active = sessions.len(), "Swept expired sessions");
        }
        removed
    }

    /// Append a message to a session under its lock, trimming to
    /// `max_context`. Returns the resulting context.
    pub fn append_message(
        &self,
        token: &str,
        message: ChatMessage,
        max_context: usize,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        let handle = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions.get(token).cloned()
        }
        .ok_or(SessionError::NotFound)?;

        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.push_trimmed(message, max_context);
        Ok(session.messages.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session (shutdown). Returns how many were live.
    pub fn drain(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let count = sessions.len();
        sessions.clear();
        count
    }
}

/// First 8 characters of a token, safe to log.
pub fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    fn manager() -> SessionManager {
        SessionManager::new(Duration::hours(12))
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let mgr = manager();
        let tokens: HashSet<String> = (0..200).map(|_| mgr.create(t0())).collect();
        assert_eq!(tokens.len(), 200);
        assert!(tokens.iter().all(|t| t.len() == 43));
        assert_eq!(mgr.len(), 200);
    }

    #[test]
    fn validate_refreshes_last_active() {
        let mgr = manager();
        let token = mgr.create(t0());

        let later = t0() + Duration::hours(11);
        let handle = mgr.validate(&token, later).unwrap();
        assert_eq!(handle.lock().unwrap().last_active, later);

        // Sliding: 11h after the refresh is still inside the TTL.
        let much_later = later + Duration::hours(11);
        assert!(mgr.validate(&token, much_later).is_ok());
    }

    #[test]
    fn ttl_boundary_is_inclusive() {
        let mgr = manager();
        let token = mgr.create(t0());
        assert!(mgr.validate(&token, t0() + Duration::hours(12)).is_ok());
    }

    #[test]
    fn expired_session_is_removed() {
        let mgr = manager();
        let token = mgr.create(t0());

        let expired_at = t0() + Duration::hours(12) + Duration::seconds(1);
        assert_eq!(mgr.validate(&token, expired_at).unwrap_err(), SessionError::NotFound);
        assert!(mgr.is_empty());
    }

    #[test]
    fn unknown_token_is_not_found() {
        let mgr = manager();
        assert!(mgr.validate("nope", t0()).is_err());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mgr = manager();
        let token = mgr.create(t0());
        assert!(mgr.destroy(&token));
        assert!(!mgr.destroy(&token));
        assert!(mgr.validate(&token, t0()).is_err());
    }

    #[test]
    fn validation_sweeps_other_stale_sessions() {
        let mgr = manager();
        let stale = mgr.create(t0());
        let fresh = mgr.create(t0() + Duration::hours(6));

        let now = t0() + Duration::hours(13);
        assert!(mgr.validate(&fresh, now).is_ok());
        assert_eq!(mgr.len(), 1);
        assert!(mgr.validate(&stale, now).is_err());
    }

    #[test]
    fn sweep_counts_removed_sessions() {
        let mgr = manager();
        mgr.create(t0());
        mgr.create(t0());
        mgr.create(t0() + Duration::hours(10));
        assert_eq!(mgr.sweep(t0() + Duration::hours(13)), 2);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn trimming_keeps_last_m_in_order() {
        for max in 1..6 {
            for n in 0..12usize {
                let mgr = manager();
                let token = mgr.create(t0());
                let mut context = Vec::new();
                for i in 0..n {
                    let msg = if i % 2 == 0 {
                        ChatMessage::user(format!("m{i}"))
                    } else {
                        ChatMessage::assistant(format!("m{i}"))
                    };
                    context = mgr.append_message(&token, msg, max).unwrap();
                    assert!(context.len() <= max);
                }
                let expected: Vec<String> =
                    (n.saturating_sub(max)..n).map(|i| format!("m{i}")).collect();
                let got: Vec<String> = context.iter().map(|m| m.content.clone()).collect();
                assert_eq!(got, expected, "n={n} max={max}");
            }
        }
    }

    #[test]
    fn append_to_missing_session_fails() {
        let mgr = manager();
        let err = mgr.append_message("gone", ChatMessage::user("hi"), 5).unwrap_err();
        assert_eq!(err, SessionError::NotFound);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let mgr = Arc::new(manager());
        let token = mgr.create(t0());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let mgr = mgr.clone();
                let token = token.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        mgr.append_message(&token, ChatMessage::user(format!("{worker}-{i}")), 1000)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let handle = mgr.validate(&token, t0()).unwrap();
        let session = handle.lock().unwrap();
        assert_eq!(session.messages().len(), 400);
        // Per-worker order is preserved.
        for worker in 0..8 {
            let prefix = format!("{worker}-");
            let seen: Vec<u32> = session
                .messages()
                .iter()
                .filter_map(|m| m.content.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn drain_empties_registry() {
        let mgr = manager();
        mgr.create(t0());
        mgr.create(t0());
        assert_eq!(mgr.drain(), 2);
        assert!(mgr.is_empty());
    }

    #[test]
    fn token_prefix_is_short() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
    }
}
