use super::core::{Client, ClientInner};
use super::execution::{ClientInfo, Dispatcher};
use crate::config::{ClientConfig, StreamFormat};
use crate::resilience::{Backoff, ExponentialBackoff};
use crate::transport::{ReqwestTransport, Transport};
use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`Client`].
///
/// Explicit settings win over the [`ClientConfig`] the builder starts from.
pub struct ClientBuilder {
    config: ClientConfig,
    backoff: Option<Arc<dyn Backoff>>,
    transport: Option<Arc<dyn Transport>>,
    client_info: ClientInfo,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Start from defaults overridden by `GENAI_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(ClientConfig::from_env())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            backoff: None,
            transport: None,
            client_info: ClientInfo::default(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Override the service base URL (mock servers, regional endpoints).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn with_stream_format(mut self, format: StreamFormat) -> Self {
        self.config.stream_format = format;
        self
    }

    /// Replace the exponential backoff derived from the config.
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    /// Replace the reqwest transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_client_info(mut self, info: ClientInfo) -> Self {
        self.client_info = info;
        self
    }

    pub fn build(self) -> Result<Client> {
        self.config.validate()?;
        let base_url = url::Url::parse(&self.config.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;

        let api_key = match &self.config.api_key {
            Some(k) => {
                let mut v = HeaderValue::from_str(k.trim()).map_err(|_| {
                    Error::configuration_with_context(
                        "API key contains characters not allowed in a header",
                        ErrorContext::new().with_field_path("api_key"),
                    )
                })?;
                v.set_sensitive(true);
                Some(v)
            }
            None => None,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let backoff: Arc<dyn Backoff> = match self.backoff {
            Some(b) => b,
            None => Arc::new(ExponentialBackoff::from(&self.config.retry)),
        };
        let dispatcher = Dispatcher::new(transport, backoff, &self.client_info)?;

        debug!(
            base_url = %base_url,
            api_version = self.config.api_version.as_str(),
            has_api_key = api_key.is_some(),
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                dispatcher,
                base_url,
                api_version: self.config.api_version,
                api_key,
                stream_format: self.config.stream_format,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
