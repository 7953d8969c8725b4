//! Cached content: a prompt prefix stored server-side and reused by reference.

use super::content::Content;
use super::request::{Tool, ToolConfig};
use super::wire;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a cached content entry expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiration {
    /// Relative to the time of the request.
    Ttl(Duration),
    /// Absolute RFC 3339 timestamp.
    ExpireTime(String),
}

/// Content stored by the service for reuse across requests.
///
/// The output-only fields (`name`, timestamps, usage) are filled in by the
/// service and never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedContent {
    /// Resource name, `cachedContents/{id}`.
    #[serde(skip_serializing)]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none", with = "wire::opt_duration")]
    pub ttl: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
    #[serde(skip_serializing)]
    pub create_time: String,
    #[serde(skip_serializing)]
    pub update_time: String,
    #[serde(skip_serializing)]
    pub usage_metadata: Option<CachedContentUsageMetadata>,
}

impl CachedContent {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self
    }

    /// Replaces any previously set expiration.
    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        match expiration {
            Expiration::Ttl(d) => {
                self.ttl = Some(d);
                self.expire_time = None;
            }
            Expiration::ExpireTime(t) => {
                self.expire_time = Some(t);
                self.ttl = None;
            }
        }
        self
    }

    /// The absolute expiry when known, otherwise the TTL.
    pub fn expiration(&self) -> Option<Expiration> {
        match (&self.expire_time, self.ttl) {
            (Some(t), _) => Some(Expiration::ExpireTime(t.clone())),
            (None, Some(d)) => Some(Expiration::Ttl(d)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedContentUsageMetadata {
    pub total_token_count: i32,
}
