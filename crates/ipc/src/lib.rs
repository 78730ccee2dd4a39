//! Protocol models for the talentmatch query service.
//!
//! Requests arrive as loosely-typed JSON objects. They are converted into a
//! [`MatchRequest`] at the boundary so the service core only ever sees a
//! validated, strongly-typed request.

use core_types::DEFAULT_TOP_N;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod requirement;

pub use requirement::RequirementDocument;

/// Validated match request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub requirement_text: String,
    pub top_n: usize,
}

impl MatchRequest {
    pub fn new(requirement_text: impl Into<String>, top_n: usize) -> Self {
        Self {
            requirement_text: requirement_text.into(),
            top_n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    /// Most similar candidate first.
    pub ranked_candidate_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Service lifecycle state as reported on the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStateKind {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: ServiceStateKind,
    pub indexed: Option<usize>,
    pub dimension: Option<usize>,
    pub embedder: Option<String>,
    pub failure: Option<String>,
}

/// Limits applied while parsing a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub default_top_n: usize,
    /// Larger values are clamped down, matching the index's clamp policy.
    pub max_top_n: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            default_top_n: DEFAULT_TOP_N,
            max_top_n: 1000,
        }
    }
}

/// Request-scoped validation failures. None of these affect service state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Missing 'requirement_text' in request body")]
    MissingRequirementText,
    #[error("'requirement_text' must not be empty")]
    EmptyRequirementText,
    #[error("'top_n' must be a positive integer")]
    InvalidTopN,
    #[error("malformed request body: {0}")]
    MalformedPayload(String),
}

impl RequestError {
    /// Short machine-readable label, also used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::MissingRequirementText => "missing_requirement_text",
            RequestError::EmptyRequirementText => "empty_requirement_text",
            RequestError::InvalidTopN => "invalid_top_n",
            RequestError::MalformedPayload(_) => "malformed_payload",
        }
    }
}

/// Parse raw request bytes (a JSON object) into a [`MatchRequest`].
pub fn parse_match_request(bytes: &[u8], limits: RequestLimits) -> Result<MatchRequest, RequestError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RequestError::MissingRequirementText);
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| RequestError::MalformedPayload(e.to_string()))?;
    match_request_from_value(&value, limits)
}

/// Convert an already-decoded JSON payload into a [`MatchRequest`].
pub fn match_request_from_value(
    value: &Value,
    limits: RequestLimits,
) -> Result<MatchRequest, RequestError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RequestError::MalformedPayload("expected a JSON object".into()))?;

    let requirement_text = match obj.get("requirement_text") {
        None | Some(Value::Null) => return Err(RequestError::MissingRequirementText),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(RequestError::EmptyRequirementText);
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(RequestError::MalformedPayload(
                "'requirement_text' must be a string".into(),
            ));
        }
    };

    let top_n = match obj.get("top_n") {
        None | Some(Value::Null) => limits.default_top_n,
        Some(v) => match v.as_u64() {
            Some(0) | None => return Err(RequestError::InvalidTopN),
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        },
    };

    Ok(MatchRequest {
        requirement_text,
        top_n: top_n.min(limits.max_top_n).max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Result<MatchRequest, RequestError> {
        match_request_from_value(&v, RequestLimits::default())
    }

    #[test]
    fn top_n_defaults_to_twenty() {
        let req = parse(json!({ "requirement_text": "physics teacher" })).unwrap();
        assert_eq!(req, MatchRequest::new("physics teacher", 20));
    }

    #[test]
    fn explicit_top_n_is_kept() {
        let req = parse(json!({ "requirement_text": "x", "top_n": 2 })).unwrap();
        assert_eq!(req.top_n, 2);
    }

    #[test]
    fn missing_or_null_text_is_rejected() {
        assert_eq!(parse(json!({ "top_n": 3 })), Err(RequestError::MissingRequirementText));
        assert_eq!(
            parse(json!({ "requirement_text": null })),
            Err(RequestError::MissingRequirementText)
        );
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(
            parse(json!({ "requirement_text": "   " })),
            Err(RequestError::EmptyRequirementText)
        );
    }

    #[test]
    fn non_positive_or_fractional_top_n_is_rejected() {
        for bad in [json!(0), json!(-3), json!(2.5), json!("10")] {
            assert_eq!(
                parse(json!({ "requirement_text": "x", "top_n": bad })),
                Err(RequestError::InvalidTopN)
            );
        }
    }

    #[test]
    fn huge_top_n_is_clamped_to_limit() {
        let req = parse(json!({ "requirement_text": "x", "top_n": 1_000_000 })).unwrap();
        assert_eq!(req.top_n, 1000);
    }

    #[test]
    fn non_object_payloads_are_malformed() {
        assert!(matches!(parse(json!(["x"])), Err(RequestError::MalformedPayload(_))));
        assert!(matches!(
            parse(json!({ "requirement_text": 42 })),
            Err(RequestError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_match_request(b"{not json", RequestLimits::default()),
            Err(RequestError::MalformedPayload(_))
        ));
        assert_eq!(
            parse_match_request(b"  ", RequestLimits::default()),
            Err(RequestError::MissingRequirementText)
        );
    }

    #[test]
    fn response_uses_wire_field_names() {
        let resp = MatchResponse {
            ranked_candidate_ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "ranked_candidate_ids": ["a", "b"] })
        );
        assert_eq!(
            serde_json::to_value(ServiceStateKind::Ready).unwrap(),
            json!("ready")
        );
    }
}
