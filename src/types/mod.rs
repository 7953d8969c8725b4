//! 类型系统模块：请求、响应与内容的数据模型。
//!
//! # Types Module
//!
//! Strongly-typed representations of what travels over the wire.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`content`] | [`Content`], [`Part`] and the part payloads |
//! | [`response`] | [`GenerateContentResponse`], [`Candidate`], safety and citation data |
//! | [`request`] | Generation, safety and tool configuration |
//! | [`model_info`] | Model listing, token counts, embeddings |
//! | [`file`] | Stored file metadata |
//! | [`caching`] | Cached content entries |
//! | [`wire`] | JSON shapes and decoding of response messages |
//!
//! ## Example
//!
//! ```rust
//! use genai_lib_rust::types::{Blob, Content, Part};
//!
//! let prompt = Content::user(vec![
//!     Part::text("What is in this picture?"),
//!     Part::Blob(Blob::image("png", vec![0x89, 0x50, 0x4e, 0x47])),
//! ]);
//! assert_eq!(prompt.text(), "What is in this picture?");
//! ```

pub mod caching;
pub mod content;
pub mod file;
pub mod model_info;
pub mod request;
pub mod response;
pub mod wire;

pub use content::{
    Blob, CodeExecutionResult, Content, ExecutableCode, FileData, FunctionCall,
    FunctionResponse, Language, Outcome, Part, PartKind, Role,
};
pub use caching::{CachedContent, CachedContentUsageMetadata, Expiration};
pub use file::{File, FileError, FileState, VideoMetadata};
pub use model_info::{
    BatchEmbedContentsResponse, ContentEmbedding, CountTokensResponse, EmbedContentResponse, Model,
};
pub use request::{
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, GenerationConfig,
    HarmBlockThreshold, SafetySetting, TaskType, Tool, ToolConfig,
};
pub use response::{
    BlockReason, Candidate, CitationMetadata, CitationSource, FinishReason,
    GenerateContentResponse, HarmCategory, HarmProbability, PromptFeedback, SafetyRating,
    UsageMetadata,
};
