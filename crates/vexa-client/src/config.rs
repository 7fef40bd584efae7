//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::{paths, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Directory holding the persisted session
    pub session_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_dir: paths::vexa_data_dir(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// - `VEXA_API_URL`: backend base URL
    /// - `VEXA_TIMEOUT_SECS`: request timeout
    /// - `VEXA_DATA_DIR`: where the session file lives
    pub fn from_env() -> Self {
        let base_url = std::env::var("VEXA_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = std::env::var("VEXA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let session_dir = std::env::var("VEXA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| paths::vexa_data_dir());

        Self {
            base_url,
            timeout,
            session_dir,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn session_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.session_dir = path.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::builder()
            .base_url("http://api.internal:9000")
            .timeout(Duration::from_secs(5))
            .session_dir("/tmp/vexa-test")
            .build();
        assert_eq!(config.base_url, "http://api.internal:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.session_dir, PathBuf::from("/tmp/vexa-test"));
    }
}
