//! `pinchat doctor`: Diagnose configuration and connectivity.

use std::path::PathBuf;
use std::time::Duration;

use pinchat_config::AppConfig;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("pinchat doctor");
    println!("==============\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            println!("\n{config:#?}\n");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  Example config:\n");
            println!("{}", AppConfig::example_toml());
            return Ok(());
        }
    };

    match config.tz() {
        Ok(tz) => println!("  ✅ Timezone {}", tz.name()),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match std::fs::read_to_string(&config.ledger_path) {
        Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(_) => println!("  ✅ Ledger readable at {}", config.ledger_path.display()),
            Err(e) => {
                println!(
                    "  ⚠️  Ledger at {} is not valid JSON ({e}); it will be reset on next write",
                    config.ledger_path.display()
                );
                issues += 1;
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!(
            "  ⚠️  No ledger at {} yet (created on first start)",
            config.ledger_path.display()
        ),
        Err(e) => {
            println!("  ❌ Ledger at {} unreadable: {e}", config.ledger_path.display());
            issues += 1;
        }
    }

    match adapter_reachable(&config.llm_adapter_url).await {
        Ok(()) => println!("  ✅ Adapter reachable at {}", config.llm_adapter_url),
        Err(e) => {
            println!("  ❌ Adapter at {} unreachable: {e}", config.llm_adapter_url);
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Open a TCP connection to the adapter's host. No request is sent, so
/// nothing is generated or billed.
async fn adapter_reachable(url: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    let addrs = url.socket_addrs(|| None).map_err(|e| e.to_string())?;
    let addr = addrs.first().ok_or("no address resolved")?;
    tokio::time::timeout(Duration::from_secs(3), tokio::net::TcpStream::connect(addr))
        .await
        .map_err(|_| "connection timed out".to_string())?
        .map_err(|e| e.to_string())?;
    Ok(())
}
