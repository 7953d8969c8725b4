use super::context::CallContext;
use super::core::Client;
use crate::transport::HttpRequest;
use crate::types::content::{Content, Part};
use crate::types::model_info::{BatchEmbedContentsResponse, EmbedContentResponse};
use crate::types::request::{BatchEmbedContentsRequest, EmbedContentRequest, TaskType};
use crate::{Error, ErrorContext, Result};
use tracing::debug;

/// A model that produces embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    client: Client,
    name: String,
    /// Sent with every request unless a title forces `RETRIEVAL_DOCUMENT`.
    pub task_type: Option<TaskType>,
}

impl EmbeddingModel {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self {
            client,
            name,
            task_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub async fn embed_content(
        &self,
        ctx: &CallContext,
        parts: Vec<Part>,
    ) -> Result<EmbedContentResponse> {
        self.embed(ctx, "", parts).await
    }

    /// Embed a document with a title. A non-empty title implies
    /// [`TaskType::RetrievalDocument`].
    pub async fn embed_content_with_title(
        &self,
        ctx: &CallContext,
        title: &str,
        parts: Vec<Part>,
    ) -> Result<EmbedContentResponse> {
        self.embed(ctx, title, parts).await
    }

    async fn embed(
        &self,
        ctx: &CallContext,
        title: &str,
        parts: Vec<Part>,
    ) -> Result<EmbedContentResponse> {
        let content = Content::unattributed(parts);
        let url = self.client.endpoint(&format!("{}:embedContent", self.name))?;
        let request = HttpRequest::post_json(url, &self.request_body(&content, title))?;
        self.client.send_json(ctx, request).await
    }

    /// An empty batch for [`batch_embed_contents`](Self::batch_embed_contents).
    pub fn new_batch(&self) -> EmbeddingBatch {
        EmbeddingBatch::default()
    }

    /// Embed every entry of `batch` in one call. Embeddings come back in
    /// the order the entries were added.
    pub async fn batch_embed_contents(
        &self,
        ctx: &CallContext,
        batch: &EmbeddingBatch,
    ) -> Result<BatchEmbedContentsResponse> {
        if batch.is_empty() {
            return Err(Error::validation_with_context(
                "embedding batch is empty",
                ErrorContext::new().with_field_path("requests"),
            ));
        }
        let requests = batch
            .entries
            .iter()
            .map(|(content, title)| EmbedContentRequest {
                model: Some(self.name.as_str()),
                ..self.request_body(content, title)
            })
            .collect();
        let url = self
            .client
            .endpoint(&format!("{}:batchEmbedContents", self.name))?;
        let request = HttpRequest::post_json(url, &BatchEmbedContentsRequest { requests })?;
        let resp: BatchEmbedContentsResponse = self.client.send_json(ctx, request).await?;
        debug!(
            requests = batch.len(),
            embeddings = resp.embeddings.len(),
            "batch embedded"
        );
        Ok(resp)
    }

    fn request_body<'a>(&self, content: &'a Content, title: &'a str) -> EmbedContentRequest<'a> {
        if title.is_empty() {
            EmbedContentRequest {
                model: None,
                content,
                task_type: self.task_type,
                title: None,
            }
        } else {
            EmbedContentRequest {
                model: None,
                content,
                task_type: Some(TaskType::RetrievalDocument),
                title: Some(title),
            }
        }
    }
}

/// Contents to embed together, built with [`EmbeddingModel::new_batch`].
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    entries: Vec<(Content, String)>,
}

impl EmbeddingBatch {
    pub fn add_content(self, parts: Vec<Part>) -> Self {
        self.add_content_with_title("", parts)
    }

    /// A non-empty title implies [`TaskType::RetrievalDocument`] for this entry.
    pub fn add_content_with_title(mut self, title: &str, parts: Vec<Part>) -> Self {
        self.entries
            .push((Content::unattributed(parts), title.to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
