use super::context::CallContext;
use super::core::Client;
use crate::transport::HttpRequest;
use crate::types::caching::CachedContent;
use crate::types::file::File;
use crate::types::model_info::Model;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

/// A resource that the service lists page by page.
pub trait Listable: DeserializeOwned {
    /// Collection path, which is also the field holding a page's items.
    const COLLECTION: &'static str;
}

impl Listable for Model {
    const COLLECTION: &'static str = "models";
}

impl Listable for File {
    const COLLECTION: &'static str = "files";
}

impl Listable for CachedContent {
    const COLLECTION: &'static str = "cachedContents";
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPage {
    next_page_token: String,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Lazily paginated listing of one collection.
#[derive(Debug)]
pub struct PageIterator<T> {
    client: Client,
    ctx: CallContext,
    page_size: Option<u32>,
    buffer: VecDeque<T>,
    next_page_token: Option<String>,
    exhausted: bool,
}

pub type ModelIterator = PageIterator<Model>;
pub type FileIterator = PageIterator<File>;
pub type CachedContentIterator = PageIterator<CachedContent>;

impl<T: Listable> PageIterator<T> {
    pub(crate) fn new(client: Client, ctx: CallContext) -> Self {
        Self {
            client,
            ctx,
            page_size: None,
            buffer: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
        }
    }

    /// Ask the service for pages of at most `n` items.
    pub fn with_page_size(mut self, n: u32) -> Self {
        self.page_size = Some(n);
        self
    }

    /// The next item, or `Ok(None)` after the last page.
    pub async fn next(&mut self) -> Result<Option<T>> {
        while self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let mut url = self.client.endpoint(T::COLLECTION)?;
        {
            let mut q = url.query_pairs_mut();
            if let Some(n) = self.page_size {
                q.append_pair("pageSize", &n.to_string());
            }
            if let Some(token) = &self.next_page_token {
                q.append_pair("pageToken", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        let mut page: RawPage = self
            .client
            .send_json(&self.ctx, HttpRequest::get(url))
            .await?;
        let items: Vec<T> = match page.rest.remove(T::COLLECTION) {
            Some(v) => serde_json::from_value(v)?,
            None => Vec::new(),
        };
        debug!(
            collection = T::COLLECTION,
            items = items.len(),
            has_next = !page.next_page_token.is_empty(),
            "fetched page"
        );
        self.buffer.extend(items);
        if page.next_page_token.is_empty() {
            self.exhausted = true;
            self.next_page_token = None;
        } else {
            self.next_page_token = Some(page.next_page_token);
        }
        Ok(())
    }

    /// Drain the remaining items.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }
}
