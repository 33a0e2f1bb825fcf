//! Configuration loading, validation, and management for pinchat.
//!
//! Loads configuration from an optional TOML file, then applies
//! environment variable overrides (`APP_PIN`, `DAILY_LIMIT`, ...).
//! Validates all settings at startup so a misconfigured relay never
//! starts serving.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound for `MAX_INPUT_CHARS`; also sizes the gateway's body limit.
pub const MAX_INPUT_CHARS_LIMIT: usize = 100_000;
/// Upper bound for `COOLDOWN_SECONDS` (one day).
pub const MAX_COOLDOWN_SECONDS: u64 = 86_400;
/// Upper bound for `SESSION_TTL_HOURS` (one year).
pub const MAX_SESSION_TTL_HOURS: u64 = 8_760;
/// Upper bound for `LOCKOUT_MINUTES` (one week).
pub const MAX_LOCKOUT_MINUTES: u64 = 10_080;
/// Upper bound for `LLM_TIMEOUT_SECONDS`.
pub const MAX_LLM_TIMEOUT_SECONDS: u64 = 600;

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shared PIN every user logs in with
    #[serde(default)]
    pub pin: String,

    /// Display name shown on pages and offered to the system prompt
    #[serde(default)]
    pub app_name: String,

    /// Requests allowed per UTC day across all sessions
    #[serde(default)]
    pub daily_limit: u64,

    /// Minimum seconds between two sends of one session
    #[serde(default)]
    pub cooldown_seconds: u64,

    /// Maximum characters per user message
    #[serde(default)]
    pub max_input_chars: usize,

    /// Messages retained per session (oldest evicted first)
    #[serde(default)]
    pub max_context_messages: usize,

    /// Full URL of the adapter's generate endpoint
    #[serde(default)]
    pub llm_adapter_url: String,

    /// Sliding session lifetime
    #[serde(default)]
    pub session_ttl_hours: u64,

    /// Optional system prompt with `{app_name}`, `{date}`, `{timezone}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// IANA timezone name used to render `{date}`
    #[serde(default)]
    pub timezone: String,

    /// Output token budget forwarded to the adapter
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Upper bound on one adapter call
    #[serde(default = "default_llm_timeout_seconds")]
    pub llm_timeout_seconds: u64,

    /// Where daily counts and lockout state are persisted
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// HTTP listener configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// PIN lockout policy
    #[serde(default)]
    pub lockout: LockoutConfig,
}

fn default_max_output_tokens() -> u32 {
    600
}
fn default_llm_timeout_seconds() -> u64 {
    30
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("data").join("usage.json")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("pin", &"[REDACTED]")
            .field("app_name", &self.app_name)
            .field("daily_limit", &self.daily_limit)
            .field("cooldown_seconds", &self.cooldown_seconds)
            .field("max_input_chars", &self.max_input_chars)
            .field("max_context_messages", &self.max_context_messages)
            .field("llm_adapter_url", &self.llm_adapter_url)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("system_prompt", &self.system_prompt)
            .field("timezone", &self.timezone)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("llm_timeout_seconds", &self.llm_timeout_seconds)
            .field("ledger_path", &self.ledger_path)
            .field("gateway", &self.gateway)
            .field("lockout", &self.lockout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Add `Secure` to the session cookie (set behind TLS)
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lockout
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    #[serde(default = "default_lockout_minutes")]
    pub duration_minutes: u64,
}

fn default_max_failures() -> u32 {
    5
}
fn default_lockout_minutes() -> u64 {
    10
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            duration_minutes: default_lockout_minutes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus the process
    /// environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path without validating.
    ///
    /// A missing file yields the defaults; environment overrides usually
    /// supply the rest.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment-style overrides from `lookup`.
    ///
    /// Blank values are ignored, so `APP_PIN=` does not clear a PIN set in
    /// the file.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APP_PIN") {
            self.pin = v;
        }
        if let Some(v) = get("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = get("DAILY_LIMIT") {
            self.daily_limit = parse_env("DAILY_LIMIT", &v)?;
        }
        if let Some(v) = get("COOLDOWN_SECONDS") {
            self.cooldown_seconds = parse_env("COOLDOWN_SECONDS", &v)?;
        }
        if let Some(v) = get("MAX_INPUT_CHARS") {
            self.max_input_chars = parse_env("MAX_INPUT_CHARS", &v)?;
        }
        if let Some(v) = get("MAX_CONTEXT_MESSAGES") {
            self.max_context_messages = parse_env("MAX_CONTEXT_MESSAGES", &v)?;
        }
        if let Some(v) = get("LLM_ADAPTER_URL") {
            self.llm_adapter_url = v;
        }
        if let Some(v) = get("SESSION_TTL_HOURS") {
            self.session_ttl_hours = parse_env("SESSION_TTL_HOURS", &v)?;
        }
        if let Some(v) = get("SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        if let Some(v) = get("TIMEZONE") {
            self.timezone = v;
        }
        if let Some(v) = get("MAX_OUTPUT_TOKENS") {
            self.max_output_tokens = parse_env("MAX_OUTPUT_TOKENS", &v)?;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECONDS") {
            self.llm_timeout_seconds = parse_env("LLM_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = get("HOST") {
            self.gateway.host = v;
        }
        if let Some(v) = get("PORT") {
            self.gateway.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("COOKIE_SECURE") {
            self.gateway.cookie_secure = parse_env("COOKIE_SECURE", &v)?;
        }
        if let Some(v) = get("LOCKOUT_MAX_FAILURES") {
            self.lockout.max_failures = parse_env("LOCKOUT_MAX_FAILURES", &v)?;
        }
        if let Some(v) = get("LOCKOUT_MINUTES") {
            self.lockout.duration_minutes = parse_env("LOCKOUT_MINUTES", &v)?;
        }

        Ok(())
    }

    /// Validate the configuration. Missing required values are reported
    /// by the environment variable that supplies them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pin.trim().is_empty() {
            return Err(ConfigError::ValidationError("APP_PIN is required".into()));
        }
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::ValidationError("APP_NAME is required".into()));
        }
        if self.daily_limit == 0 {
            return Err(ConfigError::ValidationError(
                "DAILY_LIMIT must be greater than 0".into(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_INPUT_CHARS must be greater than 0".into(),
            ));
        }
        if self.max_input_chars > MAX_INPUT_CHARS_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "MAX_INPUT_CHARS must be at most {MAX_INPUT_CHARS_LIMIT}"
            )));
        }
        if self.cooldown_seconds > MAX_COOLDOWN_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "COOLDOWN_SECONDS must be at most {MAX_COOLDOWN_SECONDS}"
            )));
        }
        if self.max_context_messages == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_CONTEXT_MESSAGES must be greater than 0".into(),
            ));
        }
        if !(self.llm_adapter_url.starts_with("http://")
            || self.llm_adapter_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(
                "LLM_ADAPTER_URL must be an http(s) URL".into(),
            ));
        }
        if self.session_ttl_hours == 0 {
            return Err(ConfigError::ValidationError(
                "SESSION_TTL_HOURS must be greater than 0".into(),
            ));
        }
        if self.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "SESSION_TTL_HOURS must be at most {MAX_SESSION_TTL_HOURS}"
            )));
        }
        if self.timezone.trim().is_empty() {
            return Err(ConfigError::ValidationError("TIMEZONE is required".into()));
        }
        self.tz()?;
        if self.llm_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "LLM_TIMEOUT_SECONDS must be greater than 0".into(),
            ));
        }
        if self.llm_timeout_seconds > MAX_LLM_TIMEOUT_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "LLM_TIMEOUT_SECONDS must be at most {MAX_LLM_TIMEOUT_SECONDS}"
            )));
        }
        if self.lockout.max_failures == 0 {
            return Err(ConfigError::ValidationError(
                "LOCKOUT_MAX_FAILURES must be greater than 0".into(),
            ));
        }
        if self.lockout.duration_minutes > MAX_LOCKOUT_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "LOCKOUT_MINUTES must be at most {MAX_LOCKOUT_MINUTES}"
            )));
        }

        Ok(())
    }

    /// The configured timezone, parsed.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        chrono_tz::Tz::from_str(self.timezone.trim()).map_err(|_| {
            ConfigError::ValidationError(format!("TIMEZONE '{}' is not a known zone", self.timezone))
        })
    }

    // The duration accessors saturate instead of panicking on values that
    // `validate` would reject.

    pub fn cooldown(&self) -> chrono::Duration {
        saturating_duration(self.cooldown_seconds, 1)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        saturating_duration(self.session_ttl_hours, 3_600)
    }

    pub fn lockout_duration(&self) -> chrono::Duration {
        saturating_duration(self.lockout.duration_minutes, 60)
    }

    pub fn llm_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.llm_timeout_seconds)
    }

    /// Generate an example config TOML string with a placeholder PIN.
    pub fn example_toml() -> String {
        let config = Self {
            pin: "change-me".into(),
            app_name: "pinchat".into(),
            daily_limit: 200,
            cooldown_seconds: 3,
            max_input_chars: 2000,
            max_context_messages: 20,
            llm_adapter_url: "http://127.0.0.1:8001/llm/generate".into(),
            session_ttl_hours: 12,
            system_prompt: Some(
                "You are {app_name}. Today is {date} ({timezone}).".into(),
            ),
            timezone: "UTC".into(),
            ..Self::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pin: String::new(),
            app_name: String::new(),
            daily_limit: 0,
            cooldown_seconds: 0,
            max_input_chars: 0,
            max_context_messages: 0,
            llm_adapter_url: String::new(),
            session_ttl_hours: 0,
            system_prompt: None,
            timezone: String::new(),
            max_output_tokens: default_max_output_tokens(),
            llm_timeout_seconds: default_llm_timeout_seconds(),
            ledger_path: default_ledger_path(),
            gateway: GatewayConfig::default(),
            lockout: LockoutConfig::default(),
        }
    }
}

fn saturating_duration(amount: u64, unit_seconds: i64) -> chrono::Duration {
    i64::try_from(amount)
        .ok()
        .and_then(|n| n.checked_mul(unit_seconds))
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
