//! Client configuration.
//!
//! Values come from three layers, lowest precedence first: built-in defaults,
//! a YAML document or `GENAI_*` environment variables, and explicit
//! [`crate::ClientBuilder`] settings.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_API_VERSION: &str = "v1beta";

/// How streamed response bodies are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    #[default]
    Sse,
    Ndjson,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    pub proxy_url: Option<String>,
    pub stream_format: StreamFormat,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 30,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            proxy_url: None,
            stream_format: StreamFormat::Sse,
            retry: RetryConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl ClientConfig {
    /// Defaults overridden by `GENAI_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn merge_env(mut self) -> Self {
        if let Some(key) = env_string("GENAI_API_KEY")
            .or_else(|| env_string("GEMINI_API_KEY"))
            .or_else(|| env_string("GOOGLE_API_KEY"))
        {
            self.api_key = Some(key);
        }
        if let Some(url) = env_string("GENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(v) = env_string("GENAI_API_VERSION") {
            self.api_version = v;
        }
        if let Some(secs) = env_parse("GENAI_HTTP_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        if let Some(n) = env_parse("GENAI_HTTP_POOL_MAX_IDLE_PER_HOST") {
            self.pool_max_idle_per_host = n;
        }
        if let Some(secs) = env_parse("GENAI_HTTP_POOL_IDLE_TIMEOUT_SECS") {
            self.pool_idle_timeout_secs = secs;
        }
        if let Some(proxy) = env_string("GENAI_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
        if let Some(n) = env_parse("GENAI_MAX_ATTEMPTS") {
            self.retry.max_attempts = n;
        }
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: ClientConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid client configuration: {}", e),
                ErrorContext::new().with_source("yaml"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read configuration file: {}", e),
                ErrorContext::new().with_field_path(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(self.base_url.clone()),
            )
        })?;
        if self.api_version.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "api_version must not be empty",
                ErrorContext::new().with_field_path("api_version"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "retry.max_attempts must be at least 1",
                ErrorContext::new().with_field_path("retry.max_attempts"),
            ));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(Error::configuration_with_context(
                "retry.multiplier must be >= 1.0",
                ErrorContext::new()
                    .with_field_path("retry.multiplier")
                    .with_details(self.retry.multiplier.to_string()),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_overrides_only_given_fields() {
        let cfg = ClientConfig::from_yaml_str(
            "base_url: http://localhost:8080\nretry:\n  max_attempts: 3\nstream_format: ndjson\n",
        )
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.initial_delay_ms, 100);
        assert_eq!(cfg.stream_format, StreamFormat::Ndjson);
        assert_eq!(cfg.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = ClientConfig::from_yaml_str("retry:\n  max_attempts: 0\n").unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("retry.max_attempts"));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(ClientConfig::from_yaml_str("base_url: not a url\n").is_err());
    }
}
