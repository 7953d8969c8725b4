//! Generation responses.
//!
//! Responses are deserialized through [`crate::types::wire`], which turns
//! unknown part shapes into [`crate::Error::UnrecognizedPartKind`].

use super::content::{Content, FunctionCall, Part};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit produced by one generation call or one step of a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or an empty string.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(Content::text)
            .unwrap_or_default()
    }
}

/// One alternative answer. `index` identifies it across partial messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    pub finish_reason: FinishReason,
    pub safety_ratings: Vec<SafetyRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_metadata: Option<CitationMetadata>,
    pub token_count: i32,
}

impl Candidate {
    /// Function calls requested by this candidate, in order.
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| match p {
                Part::FunctionCall(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal,)+
        }
        fallback: $fallback:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
            #[serde(other, skip_serializing)]
            #[doc(hidden)]
            __Unknown,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::__Unknown => $name::$fallback.as_str(),
                }
            }

            /// Maps values this client does not know to the fallback variant.
            pub fn normalized(self) -> Self {
                match self {
                    $name::__Unknown => $name::$fallback,
                    other => other,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Why a candidate stopped generating.
    pub enum FinishReason {
        Unspecified => "FINISH_REASON_UNSPECIFIED",
        Stop => "STOP",
        MaxTokens => "MAX_TOKENS",
        Safety => "SAFETY",
        Recitation => "RECITATION",
        Other => "OTHER",
    }
    fallback: Other
}

wire_enum! {
    /// Why a prompt was blocked.
    pub enum BlockReason {
        Unspecified => "BLOCK_REASON_UNSPECIFIED",
        Safety => "SAFETY",
        Other => "OTHER",
    }
    fallback: Other
}

wire_enum! {
    /// Category of harmful content.
    pub enum HarmCategory {
        Unspecified => "HARM_CATEGORY_UNSPECIFIED",
        Derogatory => "HARM_CATEGORY_DEROGATORY",
        Toxicity => "HARM_CATEGORY_TOXICITY",
        Violence => "HARM_CATEGORY_VIOLENCE",
        Sexual => "HARM_CATEGORY_SEXUAL",
        Medical => "HARM_CATEGORY_MEDICAL",
        Dangerous => "HARM_CATEGORY_DANGEROUS",
        Harassment => "HARM_CATEGORY_HARASSMENT",
        HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
        SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
    }
    fallback: Unspecified
}

wire_enum! {
    /// Probability that content is harmful.
    pub enum HarmProbability {
        Unspecified => "HARM_PROBABILITY_UNSPECIFIED",
        Negligible => "NEGLIGIBLE",
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
    fallback: Unspecified
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafetyRating {
    pub category: HarmCategory,
    pub probability: HarmProbability,
    pub blocked: bool,
}

/// Prompt-level feedback. Only the first message of a stream carries it in practice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptFeedback {
    pub block_reason: BlockReason,
    pub safety_ratings: Vec<SafetyRating>,
}

impl PromptFeedback {
    pub fn is_blocked(&self) -> bool {
        self.block_reason.normalized() != BlockReason::Unspecified
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CitationMetadata {
    pub citation_sources: Vec<CitationSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CitationSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// Token accounting. Values in the last streamed message are cumulative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: i32,
    pub cached_content_token_count: i32,
    pub candidates_token_count: i32,
    pub total_token_count: i32,
}

/// Reject a response whose prompt was blocked, or one with a candidate that
/// stopped for safety reasons.
pub(crate) fn check_blocked(resp: GenerateContentResponse) -> crate::Result<GenerateContentResponse> {
    if let Some(pf) = &resp.prompt_feedback {
        if pf.is_blocked() {
            return Err(crate::error::BlockedError {
                candidate: None,
                prompt_feedback: Some(pf.clone()),
            }
            .into());
        }
    }
    if let Some(c) = resp
        .candidates
        .iter()
        .find(|c| c.finish_reason == FinishReason::Safety)
    {
        return Err(crate::error::BlockedError {
            candidate: Some(Box::new(c.clone())),
            prompt_feedback: None,
        }
        .into());
    }
    Ok(resp)
}
