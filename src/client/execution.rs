//! 请求分发：重试、退避与取消。
//!
//! Resilient request dispatch: one logical call, several attempts.

use super::context::CallContext;
use super::error_classification::normalize_response;
use super::policy::{decide, AttemptOutcome, Decision, DefaultRetryPredicate, RetryPredicate};
use crate::resilience::Backoff;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::{Error, ErrorContext, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const API_CLIENT_HEADER: &str = "x-goog-api-client";
pub const IDEMPOTENCY_HEADER: &str = "x-goog-request-idempotency-token";

/// Client identification sent on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ClientInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn header_value(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Sends requests through a [`Transport`], retrying under a [`Backoff`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    backoff: Arc<dyn Backoff>,
    client_header: HeaderValue,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("client_header", &self.client_header)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        backoff: Arc<dyn Backoff>,
        client_info: &ClientInfo,
    ) -> Result<Self> {
        let client_header = HeaderValue::from_str(&client_info.header_value()).map_err(|e| {
            Error::configuration_with_context(
                format!("client info is not a valid header value: {}", e),
                ErrorContext::new().with_field_path("client_info"),
            )
        })?;
        Ok(Self {
            transport,
            backoff,
            client_header,
        })
    }

    /// Send `request`, retrying failures `predicate` accepts (the
    /// [`DefaultRetryPredicate`] when `None`).
    ///
    /// Returns the first 2xx response. A non-2xx final answer becomes
    /// [`Error::Api`]; running out of backoff budget becomes
    /// [`Error::RetriesExhausted`] around the last failure. Cancellation and
    /// deadline errors are returned as they are.
    pub async fn send(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
        predicate: Option<&dyn RetryPredicate>,
    ) -> Result<HttpResponse> {
        check_encoding_headers(&request)?;
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let predicate = predicate.unwrap_or(&DefaultRetryPredicate);
        let token = HeaderValue::from_str(&Uuid::new_v4().to_string())
            .map_err(|e| Error::runtime_with_context(e.to_string(), ErrorContext::new()))?;

        let mut request = request;
        let mut attempt: u32 = 0;
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            let replay = request.try_clone();
            let mut outgoing = request;
            self.apply_headers(&mut outgoing.headers, ctx.headers(), &token);

            attempt += 1;
            let started = Instant::now();
            let method = outgoing.method.clone();
            let path = outgoing.url.path().to_string();
            let result = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                r = self.transport.round_trip(outgoing) => r,
            };

            let (decision, failure) = match result {
                Ok(resp) if resp.is_success() => {
                    debug!(
                        http_status = resp.status,
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        path = path.as_str(),
                        "request succeeded"
                    );
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status;
                    let body = tokio::select! {
                        biased;
                        err = ctx.done() => return Err(err),
                        b = read_error_body(resp) => b,
                    };
                    let api = normalize_response(status, &body);
                    info!(
                        http_status = status,
                        status = api.status.as_deref().unwrap_or(""),
                        attempt,
                        method = %method,
                        path = path.as_str(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "request failed"
                    );
                    let d = decide(
                        predicate,
                        self.backoff.as_ref(),
                        AttemptOutcome::Status(status),
                        attempt,
                    );
                    (d, Error::Api(api))
                }
                Err(te) => {
                    warn!(
                        error = %te,
                        attempt,
                        method = %method,
                        path = path.as_str(),
                        "transport failure"
                    );
                    let d = decide(
                        predicate,
                        self.backoff.as_ref(),
                        AttemptOutcome::Transport(&te),
                        attempt,
                    );
                    (d, Error::Transport(te))
                }
            };

            match decision {
                Decision::Fail => return Err(failure),
                Decision::Exhausted => {
                    warn!(attempts = attempt, "retry budget exhausted");
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(failure),
                    });
                }
                Decision::Retry { delay } => {
                    let Some(next) = replay else {
                        return Err(Error::BodyNotReplayable {
                            source: Box::new(failure),
                        });
                    };
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after backoff"
                    );
                    tokio::select! {
                        biased;
                        err = ctx.done() => return Err(err),
                        _ = pause(delay) => {}
                    }
                    request = next;
                }
            }
        }
    }

    /// Request headers win over context headers, which win over ours.
    fn apply_headers(&self, headers: &mut HeaderMap, ctx_headers: &HeaderMap, token: &HeaderValue) {
        let explicit: HashSet<HeaderName> = headers.keys().cloned().collect();
        for (name, value) in ctx_headers {
            if !explicit.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        if !headers.contains_key(API_CLIENT_HEADER) {
            headers.insert(API_CLIENT_HEADER, self.client_header.clone());
        }
        if !headers.contains_key(IDEMPOTENCY_HEADER) {
            headers.insert(IDEMPOTENCY_HEADER, token.clone());
        }
    }
}

/// Reads an error body, keeping whatever arrived before a read failure.
async fn read_error_body(resp: HttpResponse) -> Bytes {
    let status = resp.status;
    let mut body = resp.body;
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(c) => buf.extend_from_slice(&c),
            Err(e) => {
                warn!(
                    error = %e,
                    http_status = status,
                    bytes_read = buf.len(),
                    "failed to read error body"
                );
                break;
            }
        }
    }
    buf.freeze()
}

async fn pause(delay: std::time::Duration) {
    if delay.is_zero() {
        // let a canceling task run even when the transport never suspends
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

/// Compression is negotiated by the transport.
fn check_encoding_headers(request: &HttpRequest) -> Result<()> {
    if request.headers.contains_key(ACCEPT_ENCODING) {
        return Err(Error::validation_with_context(
            "requests must not set Accept-Encoding",
            ErrorContext::new()
                .with_field_path("request.headers.accept-encoding")
                .with_source("dispatcher"),
        ));
    }
    if !request.body.is_empty() {
        if let Some(v) = request.headers.get(CONTENT_ENCODING) {
            if v.as_bytes().iter().all(u8::is_ascii_whitespace) {
                return Err(Error::validation_with_context(
                    "empty Content-Encoding on a request with a body",
                    ErrorContext::new()
                        .with_field_path("request.headers.content-encoding")
                        .with_source("dispatcher"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;

    fn request() -> HttpRequest {
        HttpRequest::new(Method::POST, Url::parse("http://localhost/v1beta/models/m:generateContent").unwrap())
            .with_body(b"{}".to_vec())
    }

    #[test]
    fn accept_encoding_is_rejected() {
        let mut req = request();
        req.headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        let err = check_encoding_headers(&req).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
    }

    #[test]
    fn empty_content_encoding_needs_a_body_to_matter() {
        let mut req = request();
        req.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(""));
        assert!(check_encoding_headers(&req).is_err());

        let mut bodiless = HttpRequest::get(Url::parse("http://localhost/models").unwrap());
        bodiless.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(""));
        assert!(check_encoding_headers(&bodiless).is_ok());

        let mut gz = request();
        gz.headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(check_encoding_headers(&gz).is_ok());
    }

    #[test]
    fn client_info_header_value() {
        assert_eq!(ClientInfo::new("genai-test", "1.2.3").header_value(), "genai-test/1.2.3");
    }
}
