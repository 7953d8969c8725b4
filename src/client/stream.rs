//! Pull-based iteration over a streamed generation.

use super::context::CallContext;
use super::core::Client;
use crate::pipeline::{create_decoder, merge_into, PipelineError};
use crate::transport::HttpRequest;
use crate::types::response::{check_blocked, Candidate, GenerateContentResponse};
use crate::types::wire::decode_response;
use crate::{BoxStream, Error, ErrorKind, Result};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

/// Receives the merged candidates of a stream that ended cleanly.
pub trait ConversationHistory: Send {
    fn append_candidates(&mut self, candidates: &[Candidate]);
}

enum State {
    Pending(Result<HttpRequest>),
    Open(BoxStream<'static, Value>),
    Done,
    Failed { kind: ErrorKind, message: String },
}

/// Iterator over the partial responses of one streamed call.
///
/// The call is opened by the first [`next`](Self::next). Each message is
/// returned as received and also folded into a cumulative response, which
/// becomes available through [`merged_response`](Self::merged_response) once
/// the stream ends cleanly. After a failure the cumulative state is reachable
/// only through [`take_partial`](Self::take_partial).
pub struct GenerateContentResponseIterator<'h> {
    client: Client,
    ctx: CallContext,
    state: State,
    partial: Option<GenerateContentResponse>,
    merged: Option<GenerateContentResponse>,
    history: Option<&'h mut dyn ConversationHistory>,
    messages: usize,
}

impl<'h> GenerateContentResponseIterator<'h> {
    pub(crate) fn new(
        client: Client,
        ctx: CallContext,
        request: Result<HttpRequest>,
        history: Option<&'h mut dyn ConversationHistory>,
    ) -> Self {
        Self {
            client,
            ctx,
            state: State::Pending(request),
            partial: None,
            merged: None,
            history,
            messages: 0,
        }
    }

    /// The next partial response, `Ok(None)` once the stream has ended.
    ///
    /// After an error every further call fails as well.
    pub async fn next(&mut self) -> Result<Option<GenerateContentResponse>> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return Ok(None),
                State::Failed { kind, message } => {
                    self.state = State::Failed {
                        kind,
                        message: message.clone(),
                    };
                    return Err(PipelineError::Terminated { kind, message }.into());
                }
                State::Pending(request) => {
                    let opened = open(self.client.clone(), self.ctx.clone(), request).await;
                    match opened {
                        Ok(stream) => {
                            debug!("generation stream opened");
                            self.state = State::Open(stream);
                        }
                        Err(e) => return Err(self.fail(e)),
                    }
                }
                State::Open(mut stream) => {
                    let item = tokio::select! {
                        biased;
                        err = self.ctx.done() => Some(Err(err)),
                        item = stream.next() => item,
                    };
                    match item {
                        None => {
                            self.finish();
                            return Ok(None);
                        }
                        Some(Err(e)) => return Err(self.fail(e)),
                        Some(Ok(value)) => {
                            let resp = match decode_response(value).and_then(check_blocked) {
                                Ok(r) => r,
                                Err(e) => return Err(self.fail(e)),
                            };
                            merge_into(&mut self.partial, &resp);
                            self.messages += 1;
                            self.state = State::Open(stream);
                            return Ok(Some(resp));
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        debug!(messages = self.messages, "generation stream finished");
        self.merged = self.partial.take();
        if let (Some(history), Some(merged)) = (self.history.take(), &self.merged) {
            history.append_candidates(&merged.candidates);
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(messages = self.messages, error = %err, "generation stream failed");
        self.state = State::Failed {
            kind: err.kind(),
            message: err.to_string(),
        };
        self.history = None;
        err
    }

    /// The cumulative response, once the stream has ended cleanly.
    pub fn merged_response(&self) -> Option<&GenerateContentResponse> {
        self.merged.as_ref()
    }

    pub fn into_merged(self) -> Option<GenerateContentResponse> {
        self.merged
    }

    /// What had been merged before the stream failed.
    pub fn take_partial(&mut self) -> Option<GenerateContentResponse> {
        match self.state {
            State::Failed { .. } => self.partial.take(),
            _ => None,
        }
    }

    /// Number of messages received so far.
    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Adapt to a [`Stream`] that ends after the last message or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<GenerateContentResponse>> + Send + 'h {
        futures::stream::unfold(Some(self), |it| async move {
            let mut it = it?;
            match it.next().await {
                Ok(Some(resp)) => Some((Ok(resp), Some(it))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

// Owns its inputs so the returned future never borrows the iterator.
async fn open(
    client: Client,
    ctx: CallContext,
    request: Result<HttpRequest>,
) -> Result<BoxStream<'static, Value>> {
    let resp = client.send(&ctx, request?).await?;
    create_decoder(client.stream_format())
        .decode_stream(resp.into_body())
        .await
}
