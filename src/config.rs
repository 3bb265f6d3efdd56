use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Session to open on startup
    pub initial_session_id: Option<String>,
    /// Repository new sessions are bound to
    pub repository_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            initial_session_id: None,
            repository_id: None,
        }
    }
}

impl Config {
    /// Build from `CODEBUDDY_*` environment variables. Call after `.env` has
    /// been loaded.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("CODEBUDDY_API_URL") {
            config.api_url = url;
        }
        if let Some(secs) = get("CODEBUDDY_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("CODEBUDDY_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("CODEBUDDY_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("CODEBUDDY_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        config.initial_session_id = get("CODEBUDDY_SESSION");
        config.repository_id = get("CODEBUDDY_REPOSITORY");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("API URL must use http or https, got {}", url.scheme());
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            bail!("Timeouts must be greater than zero");
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{} must be a number of seconds, got '{}'", key, value))?;
    Ok(Duration::from_secs(secs))
}
