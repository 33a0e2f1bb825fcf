//! `pinchat serve`: Start the HTTP server.

use std::path::PathBuf;

use pinchat_config::AppConfig;

pub async fn run(
    config_path: Option<PathBuf>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(config_path.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("pinchat: {}", config.app_name);
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Adapter:   {}", config.llm_adapter_url);
    println!("   Ledger:    {}", config.ledger_path.display());
    println!(
        "   Limits:    {} requests/day, {}s cooldown",
        config.daily_limit, config.cooldown_seconds
    );

    pinchat_gateway::start(config).await?;

    Ok(())
}
