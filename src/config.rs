//! Configuration for the Cervantes client

use std::time::Duration;

use crate::http::retry::RetryConfig;

/// Configuration for the Cervantes client.
///
/// Holds everything the HTTP pipeline and the token manager need; the durable
/// token storage implementation is injected separately at construction so the
/// config stays `Clone` + `Debug`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API. Required for relative request paths.
    pub base_url: Option<String>,

    /// Default timeout applied to every request
    pub timeout: Duration,

    /// Retry behavior for the request pipeline
    pub retry: RetryConfig,

    /// Key prefix for the durable token storage record
    pub storage_prefix: String,

    /// Whether the token manager schedules a refresh timer when tokens are set
    pub auto_refresh: bool,

    /// How long before access-token expiry the refresh timer fires
    pub refresh_threshold: Duration,

    /// Enable request/response debug logging
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            storage_prefix: crate::DEFAULT_STORAGE_PREFIX.to_string(),
            auto_refresh: true,
            refresh_threshold: Duration::from_secs(5 * 60),
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at the given API base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized variables:
    /// - `CERVANTES_BASE_URL` for the API base URL
    /// - `CERVANTES_TIMEOUT_MS` for the request timeout in milliseconds
    /// - `CERVANTES_MAX_ATTEMPTS` for the retry attempt limit
    /// - `CERVANTES_DEBUG` (`1`/`true`) for debug logging
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, crate::error::Error> {
        use std::env;

        let mut config = Self::default();

        if let Ok(base_url) = env::var("CERVANTES_BASE_URL") {
            config.base_url = Some(base_url);
        }

        if let Ok(timeout_str) = env::var("CERVANTES_TIMEOUT_MS") {
            let timeout_ms = timeout_str.parse::<u64>().map_err(|_| {
                crate::error::Error::InvalidConfig(format!(
                    "CERVANTES_TIMEOUT_MS must be a number of milliseconds, got: '{timeout_str}'"
                ))
            })?;
            config.timeout = Duration::from_millis(timeout_ms);
        }

        if let Ok(attempts_str) = env::var("CERVANTES_MAX_ATTEMPTS") {
            let max_attempts = attempts_str.parse::<u32>().map_err(|_| {
                crate::error::Error::InvalidConfig(format!(
                    "CERVANTES_MAX_ATTEMPTS must be a valid number, got: '{attempts_str}'"
                ))
            })?;
            config.retry.max_attempts = max_attempts;
        }

        if let Ok(debug) = env::var("CERVANTES_DEBUG") {
            config.debug = matches!(debug.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}

/// Builder for creating a `ClientConfig` with a fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of request attempts (first try included).
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self
    }

    /// Set the full retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the token storage key prefix.
    pub fn storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.storage_prefix = prefix.into();
        self
    }

    /// Enable or disable the scheduled auto-refresh timer.
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.auto_refresh = enabled;
        self
    }

    /// Set how long before access-token expiry the refresh timer fires.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.config.refresh_threshold = threshold;
        self
    }

    /// Enable request/response debug logging.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration.
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
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.storage_prefix, "cervantes_auth_");
        assert!(config.auto_refresh);
        assert_eq!(config.refresh_threshold, Duration::from_secs(300));
        assert!(!config.debug);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfigBuilder::new()
            .base_url("https://api.example.com")
            .timeout(Duration::from_secs(5))
            .max_attempts(5)
            .storage_prefix("test_")
            .auto_refresh(false)
            .refresh_threshold(Duration::from_secs(60))
            .debug(true)
            .build();

        assert_eq!(config.base_url, Some("https://api.example.com".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.storage_prefix, "test_");
        assert!(!config.auto_refresh);
        assert_eq!(config.refresh_threshold, Duration::from_secs(60));
        assert!(config.debug);
    }

    #[test]
    fn test_with_base_url() {
        let config = ClientConfig::with_base_url("https://api.example.com");
        assert_eq!(config.base_url, Some("https://api.example.com".to_string()));
        assert_eq!(config.retry.max_attempts, 3);
    }
}
