//! Client configuration.
//!
//! Points at one orchestrator instance. Override via environment variables
//! or explicit construction for testing.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

/// Proving can take minutes; the default timeout has to cover it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Reads are repeated this many times after the first failure.
pub const DEFAULT_READ_RETRIES: u32 = 3;

/// First backoff; each later one doubles.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Configuration for connecting to an orchestrator.
///
/// Custom `Debug` implementation redacts `api_token`.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    /// Bearer token, when the service requires one.
    pub api_token: Option<Zeroizing<String>>,
    pub timeout_secs: u64,
    /// Extra attempts for a GET whose failure is retryable.
    pub read_retries: u32,
    pub retry_delay: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("read_retries", &self.read_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_retries: DEFAULT_READ_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_read_retries(mut self, retries: u32, first_delay: Duration) -> Self {
        self.read_retries = retries;
        self.retry_delay = first_delay;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(Zeroizing::new(token.into()));
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ARCANA_API_URL` (default: `http://localhost:8000`)
    /// - `ARCANA_AUTH_TOKEN` (optional)
    /// - `ARCANA_CLIENT_TIMEOUT_SECS` (default: 300)
    /// - `ARCANA_CLIENT_READ_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("ARCANA_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let mut config = Self::new(&raw)?;
        config.api_token = std::env::var("ARCANA_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(Zeroizing::new);
        if let Some(secs) = std::env::var("ARCANA_CLIENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_secs = secs;
        }
        if let Some(retries) = std::env::var("ARCANA_CLIENT_READ_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.read_retries = retries;
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("API token contains characters not allowed in a header")]
    InvalidToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig::new("http://localhost:8000").unwrap().with_token("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(ClientConfig::new("not a url"), Err(ConfigError::InvalidUrl(..))));
    }
}
