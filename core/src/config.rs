//! Client configuration.
//!
//! A single value object, validated once when the client is built and
//! immutable afterwards.

use std::fmt;
use std::time::Duration;

use ureq::http::HeaderValue;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.shrinkix.com/v1";

pub const ENV_API_KEY: &str = "SHRINKIX_API_KEY";
pub const ENV_BASE_URL: &str = "SHRINKIX_BASE_URL";
pub const ENV_SANDBOX: &str = "SHRINKIX_SANDBOX";
pub const ENV_TIMEOUT_SECS: &str = "SHRINKIX_TIMEOUT_SECS";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    /// Defaults to [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,
    /// Sends `X-Mode: sandbox` on every request.
    pub sandbox: bool,
    /// Whole-call deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read configuration from `SHRINKIX_*` environment variables.
    ///
    /// Unset variables leave the defaults in place. The result still goes
    /// through the usual validation when a client is built from it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let sandbox = lookup(ENV_SANDBOX)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let timeout = lookup(ENV_TIMEOUT_SECS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        Self {
            api_key: lookup(ENV_API_KEY).unwrap_or_default(),
            base_url: lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()),
            sandbox,
            timeout,
        }
    }

    /// Check the configuration and return the normalized base URL.
    pub(crate) fn validate(&self) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("API key is required".to_string()));
        }
        if HeaderValue::from_str(&format!("Bearer {}", self.api_key)).is_err() {
            return Err(Error::Config(
                "API key contains characters not allowed in a header".to_string(),
            ));
        }
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base URL must start with http:// or https://, got {base_url:?}"
            )));
        }
        Ok(base_url.trim_end_matches('/').to_string())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("sandbox", &self.sandbox)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        let err = ClientConfig::new("").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ClientConfig::new("   ").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn api_key_with_control_characters_is_rejected() {
        let err = ClientConfig::new("sk_abc\n").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ClientConfig::new("sk_\rabc").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn base_url_defaults_to_production() {
        let url = ClientConfig::new("sk_test").validate().unwrap();
        assert_eq!(url, DEFAULT_BASE_URL);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let url = ClientConfig::new("sk_test")
            .with_base_url("http://localhost:3000/v1/")
            .validate()
            .unwrap();
        assert_eq!(url, "http://localhost:3000/v1");
    }

    #[test]
    fn base_url_needs_http_scheme() {
        let err = ClientConfig::new("sk_test")
            .with_base_url("ftp://example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("sk_live_secret"));
        assert!(!rendered.contains("sk_live_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn reads_environment() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk_env"),
            (ENV_BASE_URL, "http://127.0.0.1:9000/v1"),
            (ENV_SANDBOX, "True"),
            (ENV_TIMEOUT_SECS, "15"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key, "sk_env");
        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:9000/v1"));
        assert!(config.sandbox);
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn unset_environment_keeps_defaults() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
    }
}
