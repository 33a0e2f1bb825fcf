//! `pinchat usage`: Show daily request counts and PIN lockout state.

use std::path::PathBuf;

use chrono::Utc;
use pinchat_config::AppConfig;
use pinchat_ledger::{LockoutPolicy, UsageLedger};

pub fn run(config_path: Option<PathBuf>, days: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path.as_deref())?;
    let ledger = UsageLedger::new(
        config.ledger_path.clone(),
        LockoutPolicy {
            max_failures: config.lockout.max_failures,
            duration: config.lockout_duration(),
        },
    );
    let now = Utc::now();

    println!("Usage ({})", ledger.path().display());
    println!("─────────────────────────────────────");
    println!("  Today: {} / {}", ledger.daily_count(now), config.daily_limit);

    let recent = ledger.recent_days(days);
    if recent.is_empty() {
        println!("  No requests recorded yet.");
    } else {
        println!();
        println!("  {:<12} {:>8}", "Date (UTC)", "Requests");
        for (date, count) in recent {
            println!("  {date:<12} {count:>8}");
        }
    }

    let auth = ledger.auth_state();
    println!();
    match auth.locked_until {
        Some(until) if auth.is_locked(now) => {
            println!("  PIN: locked until {}", until.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        _ => println!(
            "  PIN: {} consecutive failure(s) of {} allowed",
            auth.failed_count, config.lockout.max_failures
        ),
    }

    Ok(())
}
