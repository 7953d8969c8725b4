use super::context::CallContext;
use super::core::{resource_name, Client};
use super::list::FileIterator;
use crate::transport::HttpRequest;
use crate::types::file::File;
use crate::Result;
use tracing::debug;

const COLLECTION: &str = "files";

impl Client {
    /// Metadata of one file, by id or by `files/{id}`.
    pub async fn get_file(&self, ctx: &CallContext, name: &str) -> Result<File> {
        let url = self.endpoint(&resource_name(COLLECTION, name)?)?;
        self.send_json(ctx, HttpRequest::get(url)).await
    }

    /// Iterate over the files owned by the project, fetching pages lazily.
    pub fn list_files(&self, ctx: &CallContext) -> FileIterator {
        FileIterator::new(self.clone(), ctx.clone())
    }

    pub async fn delete_file(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let name = resource_name(COLLECTION, name)?;
        let url = self.endpoint(&name)?;
        self.send_discarding_body(ctx, HttpRequest::delete(url)).await?;
        debug!(name = name.as_str(), "file deleted");
        Ok(())
    }
}
