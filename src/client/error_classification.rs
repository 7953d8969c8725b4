//! Normalization of service error payloads.
//!
//! The service reports failures as
//! `{"error": {"code", "message", "status", "details": [...]}}`; entries in
//! `details` typed `type.googleapis.com/google.rpc.ErrorInfo` carry a
//! machine-readable reason, domain and metadata.

use crate::error::{ApiError, ErrorInfo};
use serde::Deserialize;
use std::collections::HashMap;

const ERROR_INFO_TYPE: &str = "type.googleapis.com/google.rpc.ErrorInfo";

#[derive(Debug, Deserialize)]
struct Envelope {
    error: Body,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Body {
    message: String,
    status: Option<String>,
    details: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawErrorInfo {
    reason: String,
    domain: String,
    metadata: HashMap<String, String>,
}

/// Build an [`ApiError`] from a non-2xx status and its body.
///
/// A body that is not the JSON error shape still yields an error carrying
/// the status and the raw text.
pub(crate) fn normalize_response(http_status: u16, body: &[u8]) -> ApiError {
    let text = String::from_utf8_lossy(body).into_owned();
    let mut api = ApiError {
        http_status,
        body: text,
        ..Default::default()
    };
    let Ok(env) = serde_json::from_slice::<Envelope>(body) else {
        return api;
    };
    api.message = env.error.message;
    api.status = env.error.status;
    api.details = env
        .error
        .details
        .into_iter()
        .filter(|d| d.get("@type").and_then(|t| t.as_str()) == Some(ERROR_INFO_TYPE))
        .filter_map(|d| serde_json::from_value::<RawErrorInfo>(d).ok())
        .map(|d| ErrorInfo {
            reason: d.reason,
            domain: d.domain,
            metadata: d.metadata,
        })
        .collect();
    api
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_info_details() {
        let body = br#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT","details":[
            {"@type":"type.googleapis.com/google.rpc.BadRequest","fieldViolations":[]},
            {"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"just because","domain":"tests","metadata":{"k":"v"}}
        ]}}"#;
        let api = normalize_response(400, body);
        assert_eq!(api.http_status, 400);
        assert_eq!(api.status.as_deref(), Some("INVALID_ARGUMENT"));
        assert_eq!(api.message, "bad");
        assert_eq!(api.reason(), Some("just because"));
        assert_eq!(api.domain(), Some("tests"));
        assert_eq!(api.metadata().and_then(|m| m.get("k")).map(String::as_str), Some("v"));
        assert!(api.to_string().contains("reason: just because"));
    }

    #[test]
    fn non_json_body_keeps_status_and_text() {
        let api = normalize_response(502, b"<html>bad gateway</html>");
        assert_eq!(api.http_status, 502);
        assert!(api.details.is_empty());
        assert_eq!(api.body, "<html>bad gateway</html>");
        assert_eq!(api.to_string(), "service error: HTTP 502: <html>bad gateway</html>");
    }
}
