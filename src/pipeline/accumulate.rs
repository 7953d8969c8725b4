//! Folding streamed partial responses into one cumulative response.
//!
//! Candidates are matched by `index`. Matching candidates have their parts
//! concatenated, with adjacent text parts collapsed into one; the latest
//! finish reason and safety ratings win; citation sources accumulate.
//! Candidates whose index the cumulative response does not already hold are
//! dropped, so the candidate count is fixed by the first message.

use crate::types::content::{Content, Part};
use crate::types::response::{
    Candidate, CitationMetadata, GenerateContentResponse, PromptFeedback,
};
use std::collections::HashMap;
use tracing::warn;

/// Fold `msg` into `merged`. The first message becomes the cumulative response as is.
pub fn merge_into(merged: &mut Option<GenerateContentResponse>, msg: &GenerateContentResponse) {
    match merged {
        None => *merged = Some(msg.clone()),
        Some(acc) => join_responses(acc, msg),
    }
}

fn join_responses(acc: &mut GenerateContentResponse, msg: &GenerateContentResponse) {
    join_candidate_lists(&mut acc.candidates, &msg.candidates);

    // the first message's feedback stands, even when it had none
    if let Some(later) = &msg.prompt_feedback {
        if *later != PromptFeedback::default() && acc.prompt_feedback.as_ref() != Some(later) {
            warn!(
                block_reason = %later.block_reason,
                "ignoring prompt feedback on a later stream message"
            );
        }
    }

    if msg.usage_metadata.is_some() {
        acc.usage_metadata = msg.usage_metadata.clone();
    }
}

pub fn join_candidate_lists(dest: &mut [Candidate], src: &[Candidate]) {
    let by_index: HashMap<i32, &Candidate> = src.iter().map(|c| (c.index, c)).collect();
    for d in dest.iter_mut() {
        let Some(s) = by_index.get(&d.index) else {
            continue;
        };
        d.content = join_content(d.content.take(), s.content.as_ref());
        d.finish_reason = s.finish_reason;
        d.safety_ratings = s.safety_ratings.clone();
        d.citation_metadata =
            join_citation_metadata(d.citation_metadata.take(), s.citation_metadata.as_ref());
    }
}

pub fn join_content(dest: Option<Content>, src: Option<&Content>) -> Option<Content> {
    let Some(src) = src else {
        return dest;
    };
    let Some(mut dest) = dest else {
        return Some(src.clone());
    };
    if dest.role.is_none() {
        dest.role = src.role;
    }
    dest.parts.extend(src.parts.iter().cloned());
    dest.parts = merge_texts(std::mem::take(&mut dest.parts));
    Some(dest)
}

/// Collapse every run of adjacent text parts into a single text part.
/// Non-text parts are kept in place and break runs.
pub fn merge_texts(parts: Vec<Part>) -> Vec<Part> {
    let mut out: Vec<Part> = Vec::with_capacity(parts.len());
    for part in parts {
        if let (Some(Part::Text(prev)), Part::Text(next)) = (out.last_mut(), &part) {
            prev.push_str(next);
            continue;
        }
        out.push(part);
    }
    out
}

pub fn join_citation_metadata(
    dest: Option<CitationMetadata>,
    src: Option<&CitationMetadata>,
) -> Option<CitationMetadata> {
    match (dest, src) {
        (dest, None) => dest,
        (None, Some(src)) => Some(src.clone()),
        (Some(mut dest), Some(src)) => {
            dest.citation_sources
                .extend(src.citation_sources.iter().cloned());
            Some(dest)
        }
    }
}
