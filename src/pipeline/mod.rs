//! 流水线模块：流式响应的帧解码与合并。
//!
//! # Pipeline
//!
//! ```text
//! Raw Bytes → Decoder → JSON messages → wire decode → merge
//!     │           │                          │           │
//!   HTTP      SSE / NDJSON            GenerateContent   cumulative
//!                                        Response        response
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Stream decoders (SSE, NDJSON) |
//! | [`accumulate`] | Folding partial responses into one |

pub mod accumulate;
pub mod decode;

pub use accumulate::merge_into;
pub use decode::{create_decoder, NdjsonDecoder, SseDecoder};

use crate::{BoxStream, PipeResult};

/// Decoder trait for stream decoding
#[async_trait::async_trait]
pub trait Decoder: Send + Sync {
    /// Decode a byte stream into JSON values
    async fn decode_stream(
        &self,
        input: BoxStream<'static, bytes::Bytes>,
    ) -> PipeResult<BoxStream<'static, serde_json::Value>>;
}

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Re-reported failure of a stream that already ended with an error.
    #[error("Stream already terminated: {message}")]
    Terminated {
        kind: crate::ErrorKind,
        message: String,
    },
}
