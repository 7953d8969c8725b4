use super::chat::ChatSession;
use super::context::CallContext;
use super::core::Client;
use super::stream::{ConversationHistory, GenerateContentResponseIterator};
use crate::config::StreamFormat;
use crate::transport::HttpRequest;
use crate::types::content::{Content, Part};
use crate::types::model_info::CountTokensResponse;
use crate::types::request::{
    CountTokensRequest, GenerateContentRequest, GenerationConfig, SafetySetting, Tool, ToolConfig,
};
use crate::types::response::{check_blocked, GenerateContentResponse};
use crate::types::wire::decode_response;
use crate::Result;

/// A model configured for content generation.
///
/// The public fields are sent with every request made through this handle.
#[derive(Debug, Clone)]
pub struct GenerativeModel {
    client: Client,
    name: String,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
    pub tools: Vec<Tool>,
    pub tool_config: Option<ToolConfig>,
    pub system_instruction: Option<Content>,
    /// Name of a cached content entry used as the prompt prefix.
    pub cached_content: Option<String>,
}

impl GenerativeModel {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self {
            client,
            name,
            generation_config: GenerationConfig::default(),
            safety_settings: Vec::new(),
            tools: Vec::new(),
            tool_config: None,
            system_instruction: None,
            cached_content: None,
        }
    }

    /// Full resource name, e.g. `models/gemini-1.5-flash`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_config(mut self, config: ToolConfig) -> Self {
        self.tool_config = Some(config);
        self
    }

    pub fn with_system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self
    }

    pub fn with_cached_content(mut self, name: impl Into<String>) -> Self {
        self.cached_content = Some(name.into());
        self
    }

    /// Generate a single response from `parts`, sent as one user turn.
    pub async fn generate_content(
        &self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse> {
        let contents = [Content::user(parts)];
        let request = self.generate_request(&contents, false)?;
        let value: serde_json::Value = self.client.send_json(ctx, request).await?;
        check_blocked(decode_response(value)?)
    }

    /// Stream a response to `parts`. Nothing is sent until the first `next()`.
    pub fn generate_content_stream(
        &self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> GenerateContentResponseIterator<'static> {
        let contents = [Content::user(parts)];
        let request = self.generate_request(&contents, true);
        self.stream_request(ctx, request, None)
    }

    pub(crate) fn stream_request<'h>(
        &self,
        ctx: &CallContext,
        request: Result<HttpRequest>,
        history: Option<&'h mut dyn ConversationHistory>,
    ) -> GenerateContentResponseIterator<'h> {
        GenerateContentResponseIterator::new(self.client.clone(), ctx.clone(), request, history)
    }

    /// Count the tokens `parts` would use as a prompt.
    pub async fn count_tokens(
        &self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> Result<CountTokensResponse> {
        let contents = [Content::user(parts)];
        let url = self.client.endpoint(&format!("{}:countTokens", self.name))?;
        let request = HttpRequest::post_json(url, &CountTokensRequest { contents: &contents })?;
        self.client.send_json(ctx, request).await
    }

    /// Start a multi-turn conversation with an empty history.
    pub fn start_chat(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }

    pub(crate) fn generate_request(&self, contents: &[Content], stream: bool) -> Result<HttpRequest> {
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let mut url = self.client.endpoint(&format!("{}:{}", self.name, method))?;
        if stream && self.client.stream_format() == StreamFormat::Sse {
            url.query_pairs_mut().append_pair("alt", "sse");
        }
        let body = GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction.as_ref(),
            generation_config: Some(&self.generation_config).filter(|c| !c.is_empty()),
            safety_settings: &self.safety_settings,
            tools: &self.tools,
            tool_config: self.tool_config.as_ref(),
            cached_content: self.cached_content.as_deref(),
        };
        HttpRequest::post_json(url, &body)
    }
}
