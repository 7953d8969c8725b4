//! Dispatcher behaviour against a scripted transport: retries, backoff,
//! cancellation and header handling.

mod common;

use common::{client_with, CountingBackoff, Script, ScriptedTransport, Tail};
use genai_lib_rust::client::execution::{API_CLIENT_HEADER, IDEMPOTENCY_HEADER};
use genai_lib_rust::client::{AttemptOutcome, RetryPredicate};
use genai_lib_rust::resilience::{ExponentialBackoff, NoPauseBackoff, PauseOneSecond};
use genai_lib_rust::transport::{HttpRequest, RequestBody};
use genai_lib_rust::{CallContext, Error, ErrorKind};
use reqwest::header::{HeaderValue, ACCEPT_ENCODING};
use std::sync::atomic::Ordering;
use std::time::Duration;
use url::Url;

const ERROR_INFO_BODY: &str = r#"{
  "error": {
    "code": 400,
    "message": "request rejected",
    "status": "INVALID_ARGUMENT",
    "details": [{
      "@type": "type.googleapis.com/google.rpc.ErrorInfo",
      "reason": "just because",
      "domain": "tests",
      "metadata": {"key": "value"}
    }]
  }
}"#;

fn request() -> HttpRequest {
    let url = Url::parse("http://genai.test/v1beta/models/gemini-test:generateContent").unwrap();
    HttpRequest::post_json(url, &serde_json::json!({"contents": []})).unwrap()
}

#[tokio::test]
async fn pre_canceled_context_never_reaches_the_transport() {
    let transport = ScriptedTransport::always(Script::status(200, "{}"));
    let client = client_with(transport.clone(), ExponentialBackoff::default());

    for _ in 0..1000 {
        let ctx = CallContext::new();
        ctx.cancel();
        let err = client
            .dispatcher()
            .send(&ctx, request(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled), "got {err:?}");
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_with_one_pause_each() {
    let transport = ScriptedTransport::new(vec![
        Script::status(500, "internal"),
        Script::status(503, "unavailable"),
        Script::status(200, "{}"),
    ]);
    let (backoff, pauses) = CountingBackoff::new(ExponentialBackoff::default());
    let client = client_with(transport.clone(), backoff);

    let start = tokio::time::Instant::now();
    let resp = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(transport.calls(), 3);
    assert_eq!(pauses.load(Ordering::SeqCst), 2);
    // 100ms then 200ms under the default policy
    assert!(start.elapsed() >= Duration::from_millis(299));
}

#[tokio::test]
async fn connection_resets_are_retried() {
    let transport = ScriptedTransport::new(vec![Script::Reset, Script::status(200, "{}")]);
    let client = client_with(transport.clone(), NoPauseBackoff);

    let resp = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried_and_carry_error_info() {
    let transport = ScriptedTransport::always(Script::status(400, ERROR_INFO_BODY));
    let client = client_with(transport.clone(), NoPauseBackoff);

    let err = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    let api = err.api_error().unwrap();
    assert_eq!(api.http_status, 400);
    assert_eq!(api.status.as_deref(), Some("INVALID_ARGUMENT"));
    assert_eq!(api.reason(), Some("just because"));
    assert_eq!(api.domain(), Some("tests"));
    assert_eq!(api.metadata().unwrap()["key"], "value");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn rate_limiting_is_not_retried_by_default() {
    let transport = ScriptedTransport::always(Script::status(429, "slow down"));
    let client = client_with(transport.clone(), NoPauseBackoff);

    let err = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap_err();
    assert_eq!(err.api_error().unwrap().http_status, 429);
    assert_eq!(err.api_error().unwrap().body, "slow down");
    assert_eq!(transport.calls(), 1);
}

fn retry_rate_limits(outcome: AttemptOutcome<'_>) -> bool {
    matches!(outcome, AttemptOutcome::Status(429))
}

#[tokio::test]
async fn a_custom_predicate_can_retry_rate_limiting() {
    let transport = ScriptedTransport::new(vec![
        Script::status(429, "slow down"),
        Script::status(200, "{}"),
    ]);
    let client = client_with(transport.clone(), NoPauseBackoff);
    let predicate: &dyn RetryPredicate = &retry_rate_limits;

    let resp = client
        .dispatcher()
        .send(&CallContext::new(), request(), Some(predicate))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_wraps_the_last_failure() {
    let transport = ScriptedTransport::always(Script::status(503, "unavailable"));
    let client = client_with(
        transport.clone(),
        ExponentialBackoff::default().with_max_attempts(3),
    );

    let err = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Exhausted);
    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.api_error().unwrap().http_status, 503);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn zero_delay_retry_loop_still_observes_cancellation() {
    let transport = ScriptedTransport::always(Script::Reset);
    let client = client_with(transport.clone(), NoPauseBackoff);
    let ctx = CallContext::new();

    let canceler = ctx.clone();
    tokio::spawn(async move { canceler.cancel() });

    let err = client
        .dispatcher()
        .send(&ctx, request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Canceled), "got {err:?}");
    assert!(transport.calls() >= 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_returns_canceled() {
    let transport = ScriptedTransport::always(Script::status(500, "internal"));
    let client = client_with(transport.clone(), PauseOneSecond);
    let ctx = CallContext::new();

    let canceler = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        canceler.cancel();
    });

    let err = client
        .dispatcher()
        .send(&ctx, request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Canceled), "got {err:?}");
    // attempts at 0s, 1s and 2s; the cancel lands in the third pause
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_a_hanging_attempt() {
    let transport = ScriptedTransport::always(Script::Hang);
    let client = client_with(transport.clone(), NoPauseBackoff);
    let ctx = CallContext::new().with_timeout(Duration::from_secs(5));

    let err = client
        .dispatcher()
        .send(&ctx, request(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn streaming_bodies_cannot_be_replayed() {
    let transport = ScriptedTransport::new(vec![
        Script::status(503, "unavailable"),
        Script::status(200, "{}"),
    ]);
    let client = client_with(transport.clone(), NoPauseBackoff);
    let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"{}"))]);
    let req = request().with_body(RequestBody::Stream(Box::pin(chunks)));

    let err = client
        .dispatcher()
        .send(&CallContext::new(), req, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BodyNotReplayable);
    assert_eq!(err.api_error().unwrap().http_status, 503);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn explicit_headers_win_and_the_token_is_stable_across_retries() {
    let transport = ScriptedTransport::new(vec![
        Script::status(500, "internal"),
        Script::status(200, "{}"),
        Script::status(200, "{}"),
    ]);
    let client = client_with(transport.clone(), NoPauseBackoff);
    let ctx = CallContext::new()
        .with_header(API_CLIENT_HEADER, "from-context/0")
        .unwrap()
        .with_header("x-trace-id", "trace-1")
        .unwrap();

    let mut req = request();
    req.headers
        .insert(API_CLIENT_HEADER, HeaderValue::from_static("explicit/1"));
    client.dispatcher().send(&ctx, req, None).await.unwrap();
    client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap();

    let seen = transport.requests();
    assert_eq!(seen.len(), 3);
    for r in &seen[..2] {
        assert_eq!(r.header(API_CLIENT_HEADER).as_deref(), Some("explicit/1"));
        assert_eq!(r.header("x-trace-id").as_deref(), Some("trace-1"));
    }
    let first = seen[0].header(IDEMPOTENCY_HEADER).unwrap();
    assert_eq!(seen[1].header(IDEMPOTENCY_HEADER).unwrap(), first);

    let third = &seen[2];
    assert_ne!(third.header(IDEMPOTENCY_HEADER).unwrap(), first);
    assert!(third
        .header(API_CLIENT_HEADER)
        .unwrap()
        .starts_with("genai-lib-rust/"));
    assert!(third.header("x-trace-id").is_none());
}

#[tokio::test]
async fn context_headers_replace_the_client_identification() {
    let transport = ScriptedTransport::always(Script::status(200, "{}"));
    let client = client_with(transport.clone(), NoPauseBackoff);
    let ctx = CallContext::new()
        .with_header(API_CLIENT_HEADER, "from-context/0")
        .unwrap();

    client.dispatcher().send(&ctx, request(), None).await.unwrap();

    let seen = transport.requests();
    let values: Vec<_> = seen[0].headers.get_all(API_CLIENT_HEADER).iter().collect();
    assert_eq!(values, [&HeaderValue::from_static("from-context/0")]);
    assert!(seen[0].header(IDEMPOTENCY_HEADER).is_some());
}

#[tokio::test]
async fn error_body_cut_short_keeps_what_arrived() {
    let transport = ScriptedTransport::always(Script::Reply {
        status: 400,
        chunks: vec![ERROR_INFO_BODY.to_string()],
        tail: Tail::Reset,
    });
    let client = client_with(transport.clone(), NoPauseBackoff);

    let err = client
        .dispatcher()
        .send(&CallContext::new(), request(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    let api = err.api_error().unwrap();
    assert_eq!(api.http_status, 400);
    assert_eq!(api.message, "request rejected");
    assert_eq!(api.reason(), Some("just because"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn accept_encoding_is_rejected_before_any_attempt() {
    let transport = ScriptedTransport::always(Script::status(200, "{}"));
    let client = client_with(transport.clone(), NoPauseBackoff);
    let mut req = request();
    req.headers
        .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    let err = client
        .dispatcher()
        .send(&CallContext::new(), req, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(transport.calls(), 0);
}
