//! Usage and authentication ledger for pinchat.
//!
//! One small JSON file holds the per-day request counts and the PIN
//! failure/lockout state. Every mutation is a whole-file
//! load → modify → save cycle under a single process-wide lock.

pub mod file_ledger;

pub use file_ledger::{AuthState, LedgerError, LockoutPolicy, UsageLedger};
