//! Shared fixtures: a scripted in-memory transport and client helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use genai_lib_rust::resilience::Backoff;
use genai_lib_rust::transport::{
    HttpRequest, HttpResponse, RequestBody, Transport, TransportError,
};
use genai_lib_rust::Client;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How a scripted body ends after its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    End,
    Reset,
    Hang,
}

#[derive(Debug, Clone)]
pub enum Script {
    Reply {
        status: u16,
        chunks: Vec<String>,
        tail: Tail,
    },
    /// The round trip fails with a connection reset.
    Reset,
    /// The round trip never completes.
    Hang,
}

impl Script {
    pub fn status(status: u16, body: &str) -> Self {
        Script::Reply {
            status,
            chunks: vec![body.to_string()],
            tail: Tail::End,
        }
    }

    pub fn ok_json(body: serde_json::Value) -> Self {
        Self::status(200, &body.to_string())
    }

    /// A 200 SSE body with one frame per message.
    pub fn sse(messages: &[serde_json::Value], tail: Tail) -> Self {
        Script::Reply {
            status: 200,
            chunks: messages
                .iter()
                .map(|m| format!("data: {}\r\n\r\n", m))
                .collect(),
            tail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_ref().expect("request had no body")).unwrap()
    }
}

/// Plays back scripted responses in order. Once one script is left it repeats.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        assert!(!scripts.is_empty());
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(script: Script) -> Arc<Self> {
        Self::new(vec![script])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = match &request.body {
            RequestBody::Bytes(b) => Some(b.clone()),
            _ => None,
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.to_string(),
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body,
        });

        match self.next_script() {
            Script::Reset => Err(TransportError::ConnectionReset("scripted reset".into())),
            Script::Hang => std::future::pending().await,
            Script::Reply {
                status,
                chunks,
                tail,
            } => {
                let head = futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<_, genai_lib_rust::Error>(Bytes::from(c))),
                );
                let body: genai_lib_rust::BoxStream<'static, Bytes> = match tail {
                    Tail::End => Box::pin(head),
                    Tail::Reset => Box::pin(head.chain(futures::stream::once(async {
                        Err(genai_lib_rust::Error::Transport(
                            TransportError::ConnectionReset("mid-body reset".into()),
                        ))
                    }))),
                    Tail::Hang => Box::pin(head.chain(futures::stream::pending())),
                };
                Ok(HttpResponse {
                    status,
                    headers: HeaderMap::new(),
                    body,
                })
            }
        }
    }
}

/// Wraps a backoff and counts how often it was consulted.
pub struct CountingBackoff<B> {
    pub inner: B,
    pub calls: Arc<AtomicU32>,
}

impl<B: Backoff> CountingBackoff<B> {
    pub fn new(inner: B) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<B: Backoff> Backoff for CountingBackoff<B> {
    fn pause(&self, attempt: u32) -> Option<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.pause(attempt)
    }
}

pub fn client_with(transport: Arc<ScriptedTransport>, backoff: impl Backoff + 'static) -> Client {
    init_tracing();
    Client::builder()
        .with_base_url("http://genai.test")
        .with_api_key("test-key")
        .with_transport(transport)
        .with_backoff(backoff)
        .build()
        .unwrap()
}

pub fn text_message(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "index": 0,
            "content": {"role": "model", "parts": [{"text": text}]}
        }]
    })
}
