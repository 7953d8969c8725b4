//! JSON wire shapes and their conversion to the typed model.
//!
//! A part on the wire is an object with exactly one populated field; the
//! typed [`Part`] enum is recovered by looking at which one is set.

use super::content::{
    Blob, CodeExecutionResult, Content, ExecutableCode, FileData, FunctionCall,
    FunctionResponse, Part, Role,
};
use super::response::{
    Candidate, CitationMetadata, FinishReason, GenerateContentResponse, PromptFeedback,
    SafetyRating, UsageMetadata,
};
use crate::{Error, ErrorContext, Result};
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBlob {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<RawBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_code: Option<ExecutableCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution_result: Option<CodeExecutionResult>,
    /// Fields this client does not model, kept for the error message.
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, serde_json::Value>,
}

impl From<&Part> for RawPart {
    fn from(part: &Part) -> Self {
        let mut raw = RawPart::default();
        match part {
            Part::Text(t) => raw.text = Some(t.clone()),
            Part::Blob(b) => {
                raw.inline_data = Some(RawBlob {
                    mime_type: b.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&b.data),
                })
            }
            Part::FileData(f) => raw.file_data = Some(f.clone()),
            Part::FunctionCall(f) => raw.function_call = Some(f.clone()),
            Part::FunctionResponse(f) => raw.function_response = Some(f.clone()),
            Part::ExecutableCode(c) => raw.executable_code = Some(c.clone()),
            Part::CodeExecutionResult(r) => raw.code_execution_result = Some(r.clone()),
        }
        raw
    }
}

impl TryFrom<RawPart> for Part {
    type Error = Error;

    fn try_from(raw: RawPart) -> Result<Self> {
        if let Some(t) = raw.text {
            return Ok(Part::Text(t));
        }
        if let Some(b) = raw.inline_data {
            let data = base64::engine::general_purpose::STANDARD
                .decode(b.data.as_bytes())
                .map_err(|e| {
                    Error::decode_with_context(
                        format!("invalid base64 in inline data: {}", e),
                        ErrorContext::new()
                            .with_field_path("inlineData.data")
                            .with_source("wire"),
                    )
                })?;
            return Ok(Part::Blob(Blob::new(b.mime_type, data)));
        }
        if let Some(f) = raw.file_data {
            return Ok(Part::FileData(f));
        }
        if let Some(f) = raw.function_call {
            return Ok(Part::FunctionCall(f));
        }
        if let Some(f) = raw.function_response {
            return Ok(Part::FunctionResponse(f));
        }
        if let Some(c) = raw.executable_code {
            return Ok(Part::ExecutableCode(c));
        }
        if let Some(r) = raw.code_execution_result {
            return Ok(Part::CodeExecutionResult(r));
        }
        Err(Error::UnrecognizedPartKind {
            fields: raw.unknown.keys().cloned().collect(),
        })
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawPart::deserialize(deserializer)?;
        Part::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawContent {
    pub role: Option<Role>,
    pub parts: Vec<RawPart>,
}

impl TryFrom<RawContent> for Content {
    type Error = Error;

    fn try_from(raw: RawContent) -> Result<Self> {
        let parts = raw
            .parts
            .into_iter()
            .map(Part::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Content {
            role: raw.role,
            parts,
        })
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawContent::deserialize(deserializer)?;
        Content::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCandidate {
    index: i32,
    content: Option<RawContent>,
    finish_reason: FinishReason,
    safety_ratings: Vec<SafetyRating>,
    citation_metadata: Option<CitationMetadata>,
    token_count: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawResponse {
    candidates: Vec<RawCandidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

/// Decode one response message.
///
/// Enum values the client does not know are folded into their fallback
/// variant. A part with no recognized field fails with
/// [`Error::UnrecognizedPartKind`].
pub fn decode_response(value: serde_json::Value) -> Result<GenerateContentResponse> {
    let raw: RawResponse = serde_json::from_value(value)?;
    let candidates = raw
        .candidates
        .into_iter()
        .map(|c| {
            Ok(Candidate {
                index: c.index,
                content: c.content.map(Content::try_from).transpose()?,
                finish_reason: c.finish_reason.normalized(),
                safety_ratings: normalize_ratings(c.safety_ratings),
                citation_metadata: c.citation_metadata,
                token_count: c.token_count,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let prompt_feedback = raw.prompt_feedback.map(|mut pf| {
        pf.block_reason = pf.block_reason.normalized();
        pf.safety_ratings = normalize_ratings(pf.safety_ratings);
        pf
    });
    Ok(GenerateContentResponse {
        candidates,
        prompt_feedback,
        usage_metadata: raw.usage_metadata,
    })
}

fn normalize_ratings(ratings: Vec<SafetyRating>) -> Vec<SafetyRating> {
    ratings
        .into_iter()
        .map(|mut r| {
            r.category = r.category.normalized();
            r.probability = r.probability.normalized();
            r
        })
        .collect()
}

/// Decode one response message from raw bytes.
pub fn decode_response_bytes(bytes: &[u8]) -> Result<GenerateContentResponse> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    decode_response(value)
}

/// Protobuf JSON duration, e.g. `"3600s"` or `"1.5s"`.
pub(crate) fn format_duration(d: std::time::Duration) -> String {
    if d.subsec_nanos() == 0 {
        return format!("{}s", d.as_secs());
    }
    let frac = format!("{:09}", d.subsec_nanos());
    format!("{}.{}s", d.as_secs(), frac.trim_end_matches('0'))
}

pub(crate) fn parse_duration(s: &str) -> Option<std::time::Duration> {
    let body = s.trim().strip_suffix('s')?;
    let (secs, frac) = match body.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (body, ""),
    };
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: u64 = secs.parse().ok()?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac).parse().ok()?
    };
    Some(std::time::Duration::new(secs, nanos))
}

/// Serde adapter for an optional protobuf JSON duration.
pub(crate) mod opt_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&super::format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::parse_duration(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid duration: {}", raw))),
            None => Ok(None),
        }
    }
}

/// int64 fields arrive as JSON strings; plain numbers are accepted too.
pub(crate) fn int64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }
    match Int64::deserialize(d)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(t) => t.parse().map_err(serde::de::Error::custom),
    }
}
