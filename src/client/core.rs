use super::builder::ClientBuilder;
use super::context::CallContext;
use super::embed::EmbeddingModel;
use super::execution::Dispatcher;
use super::list::ModelIterator;
use super::model::GenerativeModel;
use crate::config::StreamFormat;
use crate::transport::{HttpRequest, HttpResponse};
use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Entry point to the service.
///
/// Cheap to clone; clones share the transport and configuration, which are
/// immutable after construction.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    pub dispatcher: Dispatcher,
    pub base_url: Url,
    pub api_version: String,
    pub api_key: Option<HeaderValue>,
    pub stream_format: StreamFormat,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client configured from `GENAI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ClientBuilder::from_env().build()
    }

    /// A client with default settings and the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().with_api_key(api_key).build()
    }

    /// A model handle for content generation. A bare name such as
    /// `gemini-1.5-flash` is prefixed with `models/`.
    pub fn generative_model(&self, name: &str) -> GenerativeModel {
        GenerativeModel::new(self.clone(), full_model_name(name))
    }

    pub fn embedding_model(&self, name: &str) -> EmbeddingModel {
        EmbeddingModel::new(self.clone(), full_model_name(name))
    }

    /// Iterate over all available models, fetching pages lazily.
    pub fn list_models(&self, ctx: &CallContext) -> ModelIterator {
        ModelIterator::new(self.clone(), ctx.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub(crate) fn stream_format(&self) -> StreamFormat {
        self.inner.stream_format
    }

    /// `{base_url}/{api_version}/{path}`
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let raw = format!("{}/{}/{}", base, self.inner.api_version, path);
        Url::parse(&raw).map_err(|e| {
            Error::validation_with_context(
                format!("invalid endpoint URL: {}", e),
                ErrorContext::new().with_field_path(path.to_string()).with_details(raw),
            )
        })
    }

    /// Set the credential header unless the request already carries one.
    pub(crate) fn authorize(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(key) = &self.inner.api_key {
            if !request.headers.contains_key(API_KEY_HEADER) {
                request.headers.insert(API_KEY_HEADER, key.clone());
            }
        }
        request
    }

    pub(crate) async fn send(&self, ctx: &CallContext, request: HttpRequest) -> Result<HttpResponse> {
        self.inner
            .dispatcher
            .send(ctx, self.authorize(request), None)
            .await
    }

    /// Send and decode a JSON body. The body read races the context.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<T> {
        let resp = self.send(ctx, request).await?;
        let body = tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            b = resp.bytes() => b?,
        };
        serde_json::from_slice(&body).map_err(|e| {
            Error::decode_with_context(
                format!("malformed response body: {}", e),
                ErrorContext::new().with_source("client"),
            )
        })
    }

    /// Send and drain the body without decoding it.
    pub(crate) async fn send_discarding_body(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<()> {
        let resp = self.send(ctx, request).await?;
        tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            b = resp.bytes() => b.map(|_| ()),
        }
    }
}

/// `{collection}/{id}` from either a bare id or a full resource name.
pub(crate) fn resource_name(collection: &str, name: &str) -> Result<String> {
    let id = name
        .strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name);
    if id.is_empty() || id.contains('/') {
        return Err(Error::validation_with_context(
            format!("invalid {} name: {:?}", collection, name),
            ErrorContext::new().with_field_path("name"),
        ));
    }
    Ok(format!("{}/{}", collection, id))
}

pub(crate) fn full_model_name(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("models/{}", name)
    }
}
