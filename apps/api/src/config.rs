use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Missing key puts the learning-path advisor in fallback-only mode.
    pub anthropic_api_key: Option<String>,
    pub llm_api_url: String,
    pub advisor_timeout: Duration,
    /// Refresh learning-path suggestions right after a target-role change.
    pub auto_refresh_learning_path: bool,
    /// Users whose read models are kept in memory before idle ones are evicted.
    pub propagator_user_capacity: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let advisor_timeout_secs = std::env::var("ADVISOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("ADVISOR_TIMEOUT_SECS must be a whole number of seconds")?;

        let propagator_user_capacity = match std::env::var("PROPAGATOR_USER_CAPACITY") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("PROPAGATOR_USER_CAPACITY must be a positive whole number")?,
            Err(_) => crate::propagation::propagator::DEFAULT_USER_CAPACITY,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            llm_api_url: std::env::var("LLM_API_URL")
                .unwrap_or_else(|_| crate::llm_client::ANTHROPIC_API_URL.to_string()),
            advisor_timeout: Duration::from_secs(advisor_timeout_secs),
            auto_refresh_learning_path: parse_flag("AUTO_REFRESH_LEARNING_PATH", true)?,
            propagator_user_capacity,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_flag(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{key} must be a boolean flag, got '{other}'"),
        },
    }
}
