use super::context::CallContext;
use super::model::GenerativeModel;
use super::stream::{ConversationHistory, GenerateContentResponseIterator};
use crate::types::content::{Content, Part, Role};
use crate::types::response::{Candidate, GenerateContentResponse};
use crate::Result;

/// A multi-turn conversation.
///
/// Each send appends the user turn to `history` before the request goes out;
/// the model's reply is appended when its stream ends cleanly. A failed send
/// leaves the user turn in place.
#[derive(Debug, Clone)]
pub struct ChatSession {
    model: GenerativeModel,
    pub history: Vec<Content>,
}

impl ChatSession {
    pub(crate) fn new(model: GenerativeModel) -> Self {
        Self {
            model,
            history: Vec::new(),
        }
    }

    pub fn model(&self) -> &GenerativeModel {
        &self.model
    }

    /// Send `parts` and wait for the whole reply.
    ///
    /// A stream that ends without any message yields an empty response.
    pub async fn send_message(
        &mut self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse> {
        let mut iter = self.send_message_stream(ctx, parts);
        while iter.next().await?.is_some() {}
        Ok(iter.into_merged().unwrap_or_default())
    }

    /// Send `parts` and stream the reply.
    pub fn send_message_stream(
        &mut self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> GenerateContentResponseIterator<'_> {
        self.history.push(Content::user(parts));
        let model = self.model.clone();
        let request = model.generate_request(&self.history, true);
        model.stream_request(ctx, request, Some(self as &mut dyn ConversationHistory))
    }
}

impl ConversationHistory for ChatSession {
    /// Only the first candidate becomes part of the conversation.
    fn append_candidates(&mut self, candidates: &[Candidate]) {
        if let Some(content) = candidates.first().and_then(|c| c.content.as_ref()) {
            let mut turn = content.clone();
            turn.role = Some(Role::Model);
            self.history.push(turn);
        }
    }
}
