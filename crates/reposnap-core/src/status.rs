//! Public status model. Nothing in here may carry a local path.

use serde::Serialize;

use crate::types::{CommitSha, WorkflowId};

/// Public error classes. Each maps to one response class at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The ref could not be resolved on the remote (client input).
    InvalidRef,
    /// The durable executor could not be reached (infrastructure).
    ServiceUnavailable,
    /// Any other terminal failure (internal).
    WorkflowFailed,
}

impl ErrorClass {
    pub fn message(self) -> &'static str {
        match self {
            ErrorClass::InvalidRef => "invalid ref",
            ErrorClass::ServiceUnavailable => "service unavailable",
            ErrorClass::WorkflowFailed => "workflow failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicError {
    pub kind: ErrorClass,
    pub message: String,
}

impl From<ErrorClass> for PublicError {
    fn from(kind: ErrorClass) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }
}

/// The redacted result: a commit id and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicResult {
    pub sha: CommitSha,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CloneStatus {
    Started {
        workflow_id: WorkflowId,
    },
    Running {
        workflow_id: WorkflowId,
    },
    Completed {
        workflow_id: WorkflowId,
        result: PublicResult,
    },
    Failed {
        workflow_id: WorkflowId,
        error: PublicError,
    },
}

impl CloneStatus {
    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            CloneStatus::Started { workflow_id }
            | CloneStatus::Running { workflow_id }
            | CloneStatus::Completed { workflow_id, .. }
            | CloneStatus::Failed { workflow_id, .. } => workflow_id,
        }
    }

    pub fn failed(workflow_id: WorkflowId, class: ErrorClass) -> Self {
        CloneStatus::Failed {
            workflow_id,
            error: class.into(),
        }
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            CloneStatus::Failed { error, .. } => Some(error.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> WorkflowId {
        WorkflowId::parse("clone-abc").unwrap()
    }

    #[test]
    fn started_shape() {
        let json = serde_json::to_value(CloneStatus::Started { workflow_id: id() }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "started", "workflowId": "clone-abc" })
        );
    }

    #[test]
    fn completed_shape_has_sha_only() {
        let sha = CommitSha::parse("0123456789abcdef0123456789abcdef01234567").unwrap();
        let status = CloneStatus::Completed {
            workflow_id: id(),
            result: PublicResult { sha },
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["sha"], "0123456789abcdef0123456789abcdef01234567");
        assert!(json["result"].get("path").is_none());
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn failed_shape_carries_class() {
        let status = CloneStatus::failed(id(), ErrorClass::InvalidRef);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "invalid_ref");
        assert_eq!(json["error"]["message"], "invalid ref");
        assert_eq!(status.error_class(), Some(ErrorClass::InvalidRef));
    }
}
