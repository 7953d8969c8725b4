use crate::pipeline::PipelineError;
use crate::types::response::{Candidate, PromptFeedback};
use std::collections::HashMap;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_url", "request.headers")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "dispatcher", "wire_decode")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse classification of an [`Error`], carried as data so callers can branch
/// without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller canceled the call.
    Canceled,
    /// The caller's deadline passed.
    DeadlineExceeded,
    /// A transport failure that the default policy would retry.
    RetryableTransport,
    /// A transport failure that is not worth retrying.
    Transport,
    /// Retries were attempted and the backoff budget ran out.
    Exhausted,
    /// The service rejected the request (non-2xx).
    Service,
    /// Content was withheld for policy reasons.
    Blocked,
    /// A retry was required but the request body could not be re-sent.
    BodyNotReplayable,
    /// The response could not be decoded.
    Decode,
    /// The request was rejected locally before any I/O.
    InvalidRequest,
    /// Client configuration is invalid.
    Configuration,
    /// Anything else.
    Internal,
}

/// A single `google.rpc.ErrorInfo` entry from a service error payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub reason: String,
    pub domain: String,
    pub metadata: HashMap<String, String>,
}

/// Normalized service-side error.
///
/// Produced by the dispatcher from a non-2xx response.
/// When the body follows the JSON error shape, `status`, `message` and
/// `details` are filled in; otherwise only `http_status` and the raw `body` are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", format_api_error(self))]
pub struct ApiError {
    /// HTTP status code of the response.
    pub http_status: u16,
    /// Canonical status name, e.g. `INVALID_ARGUMENT`.
    pub status: Option<String>,
    /// Human readable message from the service.
    pub message: String,
    /// Machine-readable reason/domain pairs.
    pub details: Vec<ErrorInfo>,
    /// Raw response body.
    pub body: String,
}

impl ApiError {
    /// Reason of the first `ErrorInfo` detail, if any.
    pub fn reason(&self) -> Option<&str> {
        self.details.first().map(|d| d.reason.as_str())
    }

    /// Domain of the first `ErrorInfo` detail, if any.
    pub fn domain(&self) -> Option<&str> {
        self.details.first().map(|d| d.domain.as_str())
    }

    /// Metadata of the first `ErrorInfo` detail, if any.
    pub fn metadata(&self) -> Option<&HashMap<String, String>> {
        self.details.first().map(|d| &d.metadata)
    }
}

fn format_api_error(e: &ApiError) -> String {
    let mut out = format!("service error: HTTP {}", e.http_status);
    if let Some(status) = &e.status {
        out.push_str(&format!(" {}", status));
    }
    if !e.message.is_empty() {
        out.push_str(&format!(": {}", e.message));
    } else if e.details.is_empty() && !e.body.is_empty() {
        out.push_str(&format!(": {}", e.body));
    }
    if let Some(reason) = e.reason() {
        out.push_str(&format!(" (reason: {}, domain: {})", reason, e.domain().unwrap_or("")));
    }
    out
}

/// The model's response was blocked, either at the prompt or at a candidate.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", format_blocked(self))]
pub struct BlockedError {
    /// Set when a candidate finished for safety reasons. Consult its safety ratings.
    pub candidate: Option<Box<Candidate>>,
    /// Set when the prompt itself was rejected.
    pub prompt_feedback: Option<PromptFeedback>,
}

fn format_blocked(e: &BlockedError) -> String {
    let mut out = String::from("blocked: ");
    if let Some(c) = &e.candidate {
        out.push_str(&format!("candidate: {}", c.finish_reason));
    }
    if let Some(pf) = &e.prompt_feedback {
        if e.candidate.is_some() {
            out.push_str(", ");
        }
        out.push_str(&format!("prompt: {}", pf.block_reason));
    }
    out
}

/// Unified error type for the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Blocked(#[from] BlockedError),

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("request body cannot be replayed for a retry: {source}")]
    BodyNotReplayable {
        #[source]
        source: Box<Error>,
    },

    #[error("unrecognized part kind (fields: {})", .fields.join(", "))]
    UnrecognizedPartKind { fields: Vec<String> },

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("Pipeline processing error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new decode error with structured context
    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. }
            | Error::Decode { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Canceled => ErrorKind::Canceled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Transport(e) if e.is_retryable() => ErrorKind::RetryableTransport,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Api(_) => ErrorKind::Service,
            Error::Blocked(_) => ErrorKind::Blocked,
            Error::RetriesExhausted { .. } => ErrorKind::Exhausted,
            Error::BodyNotReplayable { .. } => ErrorKind::BodyNotReplayable,
            Error::UnrecognizedPartKind { .. } | Error::Decode { .. } | Error::Serialization(_) => {
                ErrorKind::Decode
            }
            Error::Pipeline(PipelineError::Terminated { kind, .. }) => *kind,
            Error::Pipeline(_) => ErrorKind::Decode,
            Error::Validation { .. } => ErrorKind::InvalidRequest,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Runtime { .. } | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// True for caller-initiated cancellation, including deadlines.
    pub fn is_canceled(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Canceled | ErrorKind::DeadlineExceeded
        )
    }

    /// The normalized service error, looking through retry exhaustion.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            Error::RetriesExhausted { source, .. } | Error::BodyNotReplayable { source } => {
                source.api_error()
            }
            _ => None,
        }
    }

    /// The blocked-content details, if this is a blocking error.
    pub fn blocked(&self) -> Option<&BlockedError> {
        match self {
            Error::Blocked(b) => Some(b),
            _ => None,
        }
    }
}
