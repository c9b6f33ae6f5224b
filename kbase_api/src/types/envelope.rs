//! The response wrapper every endpoint answers with.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Outcome tag of an [`Envelope`].
///
/// Only the literal `"error"` marks a failure. Any other tag, `null`, or a
/// non-string value reads as success.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    #[default]
    Success,
    Error,
}

impl<'de> Deserialize<'de> for EnvelopeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(tag)) if tag == "error" => Ok(Self::Error),
            _ => Ok(Self::Success),
        }
    }
}

/// Response wrapper returned by the API.
///
/// Older backend versions answer with bare payloads (`{"users": [...]}`)
/// instead of `{"status": "success", "response": {...}}`. A missing or
/// unrecognised `status` therefore reads as success, and any unrecognised top-level fields are
/// kept in `extra` so they can serve as the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    #[serde(default)]
    pub status: EnvelopeStatus,

    /// Human-readable error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,

    /// Structured error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == EnvelopeStatus::Error
    }
}

impl Envelope {
    /// A success envelope wrapping `response`.
    pub fn success(response: Value) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: None,
            response: Some(response),
            detail: None,
            extra: Map::new(),
        }
    }

    /// An error envelope with the given message and optional detail.
    pub fn error(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            message: Some(message.into()),
            response: None,
            detail,
            extra: Map::new(),
        }
    }

    /// Whether there is anything to read: a non-null `response` or direct
    /// top-level fields.
    pub fn has_payload(&self) -> bool {
        self.response.as_ref().is_some_and(|r| !r.is_null()) || !self.extra.is_empty()
    }

    /// The logical payload: `response` when present, otherwise the direct
    /// top-level fields as an object.
    pub fn into_payload(self) -> Value {
        match self.response {
            Some(response) if !response.is_null() => response,
            _ => Value::Object(self.extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_status_reads_as_success() {
        let env: Envelope = serde_json::from_value(json!({"users": []})).unwrap();
        assert!(env.is_success());
        assert!(env.response.is_none());
        assert!(env.extra.contains_key("users"));
    }

    #[test]
    fn only_error_tag_is_a_failure() {
        let ok: Envelope = serde_json::from_value(json!({"status": "ok", "users": []})).unwrap();
        assert!(ok.is_success());
        let null: Envelope = serde_json::from_value(json!({"status": null})).unwrap();
        assert!(null.is_success());
        let upper: Envelope = serde_json::from_value(json!({"status": "ERROR"})).unwrap();
        assert!(!upper.is_error());
    }

    #[test]
    fn payload_prefers_response() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "success",
            "response": {"files": [1]},
            "files": [2]
        }))
        .unwrap();
        assert_eq!(env.into_payload(), json!({"files": [1]}));
    }

    #[test]
    fn payload_falls_back_to_direct_fields() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "success",
            "response": null,
            "files": [2]
        }))
        .unwrap();
        assert!(env.has_payload());
        assert_eq!(env.into_payload(), json!({"files": [2]}));
    }

    #[test]
    fn empty_success_has_no_payload() {
        let env: Envelope = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(!env.has_payload());
        assert_eq!(env.into_payload(), json!({}));
    }

    #[test]
    fn error_envelope_fields() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "error",
            "message": "forbidden",
            "detail": {"reason": "role"}
        }))
        .unwrap();
        assert!(env.is_error());
        assert_eq!(env.message.as_deref(), Some("forbidden"));
        assert_eq!(env.detail, Some(json!({"reason": "role"})));
    }
}
