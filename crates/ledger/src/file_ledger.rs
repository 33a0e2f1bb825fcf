//! File-backed ledger: daily request counts and PIN lockout state.
//!
//! Storage format (pretty JSON, human-inspectable):
//!
//! ```json
//! {
//!   "daily": { "2026-10-19": 42 },
//!   "auth": { "failed_count": 0, "locked_until": null }
//! }
//! ```
//!
//! A missing, unreadable, or corrupt file is treated as an empty ledger.
//! Saves go to a sibling temp file that is then renamed over the real one,
//! so a crash mid-write never leaves a truncated ledger behind.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Longest lockout ever written, so `locked_until` stays a four-digit-year
/// timestamp that reads back from the file.
const MAX_LOCKOUT_DAYS: i64 = 36_500;

/// Snapshot of the PIN failure state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Consecutive failed PIN checks since the last success
    #[serde(default)]
    pub failed_count: u32,

    /// Set once `failed_count` reaches the threshold
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
}

impl AuthState {
    /// Whether a lockout is in force at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// The persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerRecord {
    /// UTC date (`YYYY-MM-DD`) → request count
    #[serde(default)]
    daily: BTreeMap<String, u64>,

    #[serde(default)]
    auth: AuthState,
}

/// How many consecutive failures lock the PIN, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failures: u32,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            duration: Duration::minutes(10),
        }
    }
}

/// Ledger persistence errors. Never surfaced to HTTP callers: the public
/// operations log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to create ledger directory {path}: {reason}")]
    CreateDir { path: PathBuf, reason: String },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write ledger file {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// The durable counter store.
///
/// The file is the single source of truth; nothing is cached between
/// calls, so external edits (e.g. an operator pruning old days) are seen
/// on the next operation.
pub struct UsageLedger {
    path: PathBuf,
    policy: LockoutPolicy,
    lock: Mutex<()>,
}

impl UsageLedger {
    /// Open a ledger at `path`. The file is created empty on first access
    /// if it does not exist.
    pub fn new(path: impl Into<PathBuf>, policy: LockoutPolicy) -> Self {
        let ledger = Self {
            path: path.into(),
            policy,
            lock: Mutex::new(()),
        };
        if !ledger.path.exists() {
            if let Err(e) = ledger.save(&LedgerRecord::default()) {
                warn!(error = %e, "Could not create ledger file, will retry on next write");
            } else {
                info!(path = %ledger.path.display(), "Created empty usage ledger");
            }
        }
        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Read-only snapshot of the PIN failure state.
    pub fn auth_state(&self) -> AuthState {
        self.read(|record| record.auth.clone())
    }

    /// Count one failed PIN check. Reaching the threshold sets the
    /// lockout expiry; the counter itself is only cleared by
    /// [`reset_auth_failures`](Self::reset_auth_failures).
    pub fn record_failed_auth(&self, now: DateTime<Utc>) -> AuthState {
        let policy = self.policy;
        self.mutate(|record| {
            let auth = &mut record.auth;
            auth.failed_count = auth.failed_count.saturating_add(1);
            if auth.failed_count >= policy.max_failures {
                let span = policy.duration.min(Duration::days(MAX_LOCKOUT_DAYS));
                let until = now
                    .checked_add_signed(span)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                auth.locked_until = Some(until);
                warn!(
                    failed_count = auth.failed_count,
                    "PIN locked after repeated failures"
                );
            }
            auth.clone()
        })
    }

    /// Clear the failure counter and any lockout, atomically.
    pub fn reset_auth_failures(&self) {
        self.mutate(|record| {
            record.auth = AuthState::default();
        });
    }

    /// Requests counted for `now`'s UTC date.
    pub fn daily_count(&self, now: DateTime<Utc>) -> u64 {
        let key = day_key(now);
        self.read(|record| record.daily.get(&key).copied().unwrap_or(0))
    }

    /// Count one request against `now`'s UTC date and return the new total.
    pub fn increment_daily(&self, now: DateTime<Utc>) -> u64 {
        let key = day_key(now);
        self.mutate(|record| {
            let count = record.daily.entry(key).or_insert(0);
            *count += 1;
            *count
        })
    }

    /// The most recent `days` daily counts, newest first.
    pub fn recent_days(&self, days: usize) -> Vec<(String, u64)> {
        self.read(|record| {
            record
                .daily
                .iter()
                .rev()
                .take(days)
                .map(|(day, count)| (day.clone(), *count))
                .collect()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerRecord) -> T) -> T {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        f(&self.load())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut LedgerRecord) -> T) -> T {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.load();
        let out = f(&mut record);
        if let Err(e) = self.save(&record) {
            warn!(error = %e, "Ledger update could not be persisted");
        }
        out
    }

    /// Load the record; anything unreadable starts fresh.
    fn load(&self) -> LedgerRecord {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Ledger file unreadable, starting empty");
                return LedgerRecord::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Corrupt ledger file, starting empty");
                LedgerRecord::default()
            }
        }
    }

    /// Write the whole record to a temp file, then rename into place.
    fn save(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::CreateDir {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let content = serde_json::to_string_pretty(record)?;
        let tmp = self.tmp_path();

        std::fs::write(&tmp, content).map_err(|e| LedgerError::Write {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(LedgerError::Write {
                path: self.path.clone(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}
