//! # genai-lib-rust
//!
//! 面向生成式内容服务的 Rust 客户端：可重试的请求分发与流式响应聚合。
//!
//! Client library for a generative-content REST service. It builds requests,
//! dispatches them with retries, backoff and cancellation, and reconstructs a
//! complete response from either a single reply or a stream of partial ones.
//!
//! ## Core Pieces
//!
//! - **Dispatcher**: [`client::Dispatcher`] sends one logical call as one or more
//!   attempts, retrying 5xx and connection failures under a [`resilience::Backoff`],
//!   racing every wait against the caller's [`CallContext`].
//! - **Aggregator**: [`GenerateContentResponseIterator`] yields each streamed
//!   message and folds it into one cumulative response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use genai_lib_rust::{CallContext, Client, Part};
//!
//! #[tokio::main]
//! async fn main() -> genai_lib_rust::Result<()> {
//!     let client = Client::from_env()?;
//!     let model = client.generative_model("gemini-1.5-flash");
//!     let ctx = CallContext::new().with_timeout(std::time::Duration::from_secs(60));
//!
//!     let mut stream = model.generate_content_stream(&ctx, vec![Part::text("Tell me a story")]);
//!     while let Some(chunk) = stream.next().await? {
//!         print!("{}", chunk.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, dispatcher, model handles, chat sessions, files, cached content |
//! | [`config`] | Client configuration (YAML / environment) |
//! | [`pipeline`] | Stream decoding and response merging |
//! | [`resilience`] | Backoff policies |
//! | [`transport`] | HTTP transport abstraction |
//! | [`types`] | Request, response and content types |

pub mod client;
pub mod config;
pub mod pipeline;
pub mod resilience;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{
    CachedContentIterator, CallContext, ChatSession, Client, ClientBuilder, ClientInfo,
    EmbeddingBatch, EmbeddingModel, FileIterator, GenerateContentResponseIterator,
    GenerativeModel, ModelIterator,
};
pub use config::ClientConfig;
pub use types::{Blob, Candidate, Content, GenerateContentResponse, Part, Role};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{ApiError, BlockedError, Error, ErrorContext, ErrorInfo, ErrorKind};
