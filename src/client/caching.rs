use super::context::CallContext;
use super::core::{full_model_name, resource_name, Client};
use super::list::CachedContentIterator;
use super::model::GenerativeModel;
use crate::transport::HttpRequest;
use crate::types::caching::{CachedContent, Expiration};
use crate::types::wire::format_duration;
use crate::Result;
use serde_json::json;
use tracing::debug;

const COLLECTION: &str = "cachedContents";

impl Client {
    /// Store `content` with the service. A bare model name gets the
    /// `models/` prefix.
    pub async fn create_cached_content(
        &self,
        ctx: &CallContext,
        content: &CachedContent,
    ) -> Result<CachedContent> {
        let mut body = content.clone();
        body.model = full_model_name(&body.model);
        let url = self.endpoint(COLLECTION)?;
        let created: CachedContent = self
            .send_json(ctx, HttpRequest::post_json(url, &body)?)
            .await?;
        debug!(
            name = created.name.as_str(),
            model = created.model.as_str(),
            "cached content created"
        );
        Ok(created)
    }

    /// Fetch one entry by id or by `cachedContents/{id}`.
    pub async fn get_cached_content(&self, ctx: &CallContext, name: &str) -> Result<CachedContent> {
        let url = self.endpoint(&resource_name(COLLECTION, name)?)?;
        self.send_json(ctx, HttpRequest::get(url)).await
    }

    pub fn list_cached_contents(&self, ctx: &CallContext) -> CachedContentIterator {
        CachedContentIterator::new(self.clone(), ctx.clone())
    }

    /// Move the expiry of an entry. Only the expiration can be changed.
    pub async fn update_cached_content(
        &self,
        ctx: &CallContext,
        name: &str,
        expiration: Expiration,
    ) -> Result<CachedContent> {
        let (mask, body) = match expiration {
            Expiration::Ttl(d) => ("ttl", json!({ "ttl": format_duration(d) })),
            Expiration::ExpireTime(t) => ("expireTime", json!({ "expireTime": t })),
        };
        let mut url = self.endpoint(&resource_name(COLLECTION, name)?)?;
        url.query_pairs_mut().append_pair("updateMask", mask);
        self.send_json(ctx, HttpRequest::patch_json(url, &body)?).await
    }

    pub async fn delete_cached_content(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let name = resource_name(COLLECTION, name)?;
        let url = self.endpoint(&name)?;
        self.send_discarding_body(ctx, HttpRequest::delete(url)).await?;
        debug!(name = name.as_str(), "cached content deleted");
        Ok(())
    }

    /// A model that uses `content` as the prefix of every prompt.
    pub fn generative_model_from_cached_content(&self, content: &CachedContent) -> GenerativeModel {
        self.generative_model(&content.model)
            .with_cached_content(content.name.clone())
    }
}
