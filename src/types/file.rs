//! Metadata of files stored with the service.

use super::content::{FileData, Part};
use super::response::wire_enum;
use super::wire;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

wire_enum! {
    /// Processing state of an uploaded file.
    pub enum FileState {
        Unspecified => "STATE_UNSPECIFIED",
        Processing => "PROCESSING",
        Active => "ACTIVE",
        Failed => "FAILED",
    }
    fallback: Unspecified
}

fn normalized_state<'de, D: Deserializer<'de>>(d: D) -> Result<FileState, D::Error> {
    FileState::deserialize(d).map(FileState::normalized)
}

/// A file known to the service. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct File {
    /// Resource name, `files/{id}`.
    pub name: String,
    pub display_name: String,
    pub mime_type: String,
    #[serde(deserialize_with = "wire::int64")]
    pub size_bytes: i64,
    pub create_time: String,
    pub update_time: String,
    pub expiration_time: Option<String>,
    /// Base64 SHA-256 of the content.
    pub sha256_hash: String,
    pub uri: String,
    #[serde(deserialize_with = "normalized_state")]
    pub state: FileState,
    /// Set when processing failed.
    pub error: Option<FileError>,
    pub video_metadata: Option<VideoMetadata>,
}

impl File {
    /// A part referring to this file, for use in a prompt.
    pub fn to_part(&self) -> Part {
        Part::FileData(FileData {
            mime_type: self.mime_type.clone(),
            file_uri: self.uri.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoMetadata {
    #[serde(with = "wire::opt_duration")]
    pub video_duration: Option<Duration>,
}
