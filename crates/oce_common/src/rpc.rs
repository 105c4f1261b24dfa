//! Request/response types for the oced HTTP API.

use crate::error::OceError;
use crate::hints::Hints;
use crate::notes::SessionNote;
use crate::summary::Summary;
use serde::{Deserialize, Serialize};

/// Body of `POST /run_oce`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Free-form user text
    #[serde(default, alias = "user_text")]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, alias = "session_ctx", skip_serializing_if = "Hints::is_empty")]
    pub hints: Hints,
}

impl RunRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    /// Project id from the top level, else from `hints.project_id`
    pub fn effective_project_id(&self) -> Option<&str> {
        self.project_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| self.hints.str("project_id"))
    }

    /// Reject requests the pipeline cannot run
    pub fn validate(&self) -> Result<(), OceError> {
        if self.text.trim().is_empty() {
            return Err(OceError::MalformedRequest(
                "field 'text' is required and must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pipeline telemetry returned next to the summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub request_id: String,
    pub events: Vec<String>,
    pub duration_ms: u64,
}

/// Body returned by `POST /run_oce`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    /// Rendered text report
    pub text: String,
    pub json_summary: Summary,
    pub telemetry: Telemetry,
}

/// Structured error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i32,
    pub message: String,
}

impl From<&OceError> for ErrorBody {
    fn from(err: &OceError) -> Self {
        Self {
            error: ErrorDetail {
                code: err.code(),
                message: err.to_string(),
            },
        }
    }
}

/// Body of `PUT /v1/notes/{project_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteWrite {
    pub key: String,
    pub value: String,
}

/// Body returned by `GET /v1/notes/{project_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesResponse {
    pub project_id: String,
    pub notes: Vec<SessionNote>,
}

/// Body returned by `DELETE /v1/notes/{project_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub project_id: String,
    pub removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_legacy_field_names() {
        let req: RunRequest = serde_json::from_value(json!({
            "user_text": "I need a risk estimate",
            "session_ctx": {"project_id": "OCE_DEMO", "mode": "pro"}
        }))
        .unwrap();
        assert_eq!(req.text, "I need a risk estimate");
        assert_eq!(req.effective_project_id(), Some("OCE_DEMO"));
        assert_eq!(req.hints.str("mode"), Some("pro"));
    }

    #[test]
    fn test_top_level_project_wins() {
        let req: RunRequest = serde_json::from_value(json!({
            "text": "x",
            "project_id": "p1",
            "hints": {"project_id": "other"}
        }))
        .unwrap();
        assert_eq!(req.effective_project_id(), Some("p1"));
    }

    #[test]
    fn test_missing_text_is_malformed() {
        let req: RunRequest = serde_json::from_value(json!({"project_id": "p1"})).unwrap();
        assert!(matches!(req.validate(), Err(OceError::MalformedRequest(_))));
        assert!(RunRequest::new("  \n").validate().is_err());
        assert!(RunRequest::new("hello").validate().is_ok());
    }

    #[test]
    fn test_malformed_hints_do_not_reject_request() {
        let req: RunRequest =
            serde_json::from_value(json!({"text": "x", "hints": "not an object"})).unwrap();
        assert!(req.hints.is_empty());
    }
}
