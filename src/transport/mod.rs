//! 传输层：HTTP 请求/响应抽象与默认的 reqwest 实现。
//!
//! # Transport
//!
//! [`Transport`] performs one HTTP round trip. It knows nothing about retries,
//! cancellation or the service's error format; those live in the dispatcher.

pub mod http;

pub use http::ReqwestTransport;

use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::fmt;
use std::pin::Pin;
use url::Url;

/// A caller-supplied streaming request body. It can be sent once only.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }

    /// A copy of this body, or `None` if it is a one-shot stream.
    pub fn try_clone(&self) -> Option<RequestBody> {
        match self {
            RequestBody::Empty => Some(RequestBody::Empty),
            RequestBody::Bytes(b) => Some(RequestBody::Bytes(b.clone())),
            RequestBody::Stream(_) => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// A POST with a JSON body.
    pub fn post_json<T: serde::Serialize + ?Sized>(url: Url, body: &T) -> Result<Self> {
        Self::json(Method::POST, url, body)
    }

    /// A PATCH with a JSON body.
    pub fn patch_json<T: serde::Serialize + ?Sized>(url: Url, body: &T) -> Result<Self> {
        Self::json(Method::PATCH, url, body)
    }

    fn json<T: serde::Serialize + ?Sized>(method: Method, url: Url, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        let mut req = Self::new(method, url);
        req.headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        req.body = RequestBody::Bytes(Bytes::from(bytes));
        Ok(req)
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// A copy suitable for another attempt, or `None` for stream bodies.
    pub fn try_clone(&self) -> Option<HttpRequest> {
        Some(HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
        })
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Bytes>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_body(self) -> BoxStream<'static, Bytes> {
        self.body
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Build a response from an in-memory body.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers: HeaderMap::new(),
            body: Box::pin(futures::stream::once(async move { Ok::<_, Error>(body) })),
        }
    }
}

/// One HTTP round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection-reset and timeout style failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ConnectionReset(_) | TransportError::Timeout(_) => true,
            TransportError::Other(_) => false,
            TransportError::Http(e) => {
                e.is_timeout() || e.is_connect() || has_retryable_io_source(e)
            }
        }
    }
}

fn has_retryable_io_source(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind;
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            );
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_bodies_cannot_be_cloned() {
        let url = Url::parse("http://localhost/x").unwrap();
        let req = HttpRequest::new(Method::POST, url.clone()).with_body(b"abc".to_vec());
        assert!(req.try_clone().is_some());

        let stream: BodyStream = Box::pin(futures::stream::empty());
        let req = HttpRequest::new(Method::POST, url).with_body(RequestBody::Stream(stream));
        assert!(req.try_clone().is_none());
        assert!(!req.body.is_empty());
    }

    #[test]
    fn reset_and_timeout_are_retryable() {
        assert!(TransportError::ConnectionReset("peer".into()).is_retryable());
        assert!(TransportError::Timeout("read".into()).is_retryable());
        assert!(!TransportError::Other("tls".into()).is_retryable());
    }

    #[tokio::test]
    async fn response_bytes_concatenates_chunks() {
        let chunks = vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let resp = HttpResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Box::pin(futures::stream::iter(chunks)),
        };
        assert_eq!(resp.bytes().await.unwrap(), Bytes::from_static(b"abcd"));
    }
}
