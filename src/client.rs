//! Client surface: construction, dispatch, and the model handles.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod caching;
pub mod chat;
pub mod context;
pub mod core;
pub mod embed;
pub(crate) mod error_classification;
pub mod execution;
pub mod files;
pub mod list;
pub mod model;
pub mod policy;
pub mod stream;

pub use builder::ClientBuilder;
pub use chat::ChatSession;
pub use context::CallContext;
pub use core::Client;
pub use embed::{EmbeddingBatch, EmbeddingModel};
pub use execution::{ClientInfo, Dispatcher};
pub use list::{CachedContentIterator, FileIterator, Listable, ModelIterator, PageIterator};
pub use model::GenerativeModel;
pub use policy::{AttemptOutcome, DefaultRetryPredicate, RetryPredicate};
pub use stream::{ConversationHistory, GenerateContentResponseIterator};
