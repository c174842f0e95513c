//! Document and submission envelope types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document to be registered with the remote API.
///
/// The body is carried as opaque JSON; its schema belongs to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Caller-assigned document identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Document type, e.g. `LP_INTRODUCE_GOODS`
    pub doc_type: String,
    /// Document content
    pub body: serde_json::Value,
}

impl Document {
    pub fn new(doc_type: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            doc_id: None,
            doc_type: doc_type.into(),
            body,
        }
    }

    pub fn with_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }
}

/// The JSON envelope sent for one document submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMessage {
    /// Unique id for this attempt
    pub request_id: Uuid,
    pub document: Document,
    /// Detached signature over the document
    pub signature: String,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionMessage {
    pub fn new(document: Document, signature: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            document,
            signature: signature.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResponse {
    /// HTTP-style status code
    pub status: u16,
    pub body: String,
}

impl SubmissionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serializes_camel_case() {
        let document = Document::new("LP_INTRODUCE_GOODS", json!({"participantInn": "7700000000"}))
            .with_id("doc-1");
        let message = SubmissionMessage::new(document, "c2lnbmF0dXJl");

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["document"]["docId"], "doc-1");
        assert_eq!(value["document"]["docType"], "LP_INTRODUCE_GOODS");
        assert_eq!(value["document"]["body"]["participantInn"], "7700000000");
        assert_eq!(value["signature"], "c2lnbmF0dXJl");
        assert!(value["requestId"].is_string());
        assert!(value["submittedAt"].is_string());
    }

    #[test]
    fn test_document_without_id_omits_field() {
        let document = Document::new("LP_INTRODUCE_GOODS", json!({}));
        let value = serde_json::to_value(&document).unwrap();
        assert!(value.get("docId").is_none());
    }

    #[test]
    fn test_each_message_gets_a_request_id() {
        let document = Document::new("LP_INTRODUCE_GOODS", json!({}));
        let a = SubmissionMessage::new(document.clone(), "sig");
        let b = SubmissionMessage::new(document, "sig");
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_response_success_range() {
        let ok = SubmissionResponse { status: 201, body: String::new() };
        let throttled = SubmissionResponse { status: 429, body: String::new() };
        assert!(ok.is_success());
        assert!(!throttled.is_success());
    }
}
