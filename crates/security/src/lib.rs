//! Security for pinchat: sessions, PIN checks, and audit logging.
//!
//! Provides:
//! - **Sessions**: in-memory registry of authenticated browsers with
//!   sliding expiry and per-session serialized mutation
//! - **PIN verification**: constant-time comparison against the shared PIN
//! - **Audit logging**: structured login/logout/lockout events

pub mod audit;
pub mod pin;
pub mod session;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use pin::PinVerifier;
pub use session::{Session, SessionError, SessionHandle, SessionManager, token_prefix};
