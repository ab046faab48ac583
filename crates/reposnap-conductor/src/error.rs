use reposnap_core::{CloneError, ValidationError, WorkflowId};
use thiserror::Error;

/// Failures of the durable executor itself, never of a workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    #[error("unknown workflow type: {0}")]
    UnknownWorkflowType(String),
    #[error("task queue {0:?} is not served by this executor")]
    UnknownTaskQueue(String),
    #[error("workflow already exists: {0}")]
    AlreadyExists(WorkflowId),
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),
    /// One workflow's journal could not be read or written. The executor
    /// itself is still healthy.
    #[error("workflow journal error: {0}")]
    Journal(String),
}

impl ExecutorError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }

    pub fn journal(err: &anyhow::Error) -> Self {
        Self::Journal(format!("{err:#}"))
    }
}

/// What a [`crate::WorkflowHandle`] can report. Only `Workflow` carries a
/// terminal workflow failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),
    #[error("workflow failed: {0}")]
    Workflow(CloneError),
}

impl From<ExecutorError> for HandleError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Unavailable(reason) => HandleError::Unavailable(reason),
            ExecutorError::NotFound(id) => HandleError::NotFound(id),
            other => HandleError::Workflow(CloneError::internal(other.to_string())),
        }
    }
}

impl From<CloneError> for HandleError {
    fn from(err: CloneError) -> Self {
        HandleError::Workflow(err)
    }
}

/// Why a workflow could not be submitted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl StartError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StartError::Executor(ExecutorError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_errors_surface_as_workflow_failures() {
        let err = ExecutorError::journal(&anyhow::anyhow!("parsing state: clone-x.json"));
        assert!(matches!(HandleError::from(err), HandleError::Workflow(CloneError::Internal { .. })));
    }

    #[test]
    fn only_unavailable_is_unavailable() {
        let unavailable = StartError::from(ExecutorError::unavailable("locked"));
        let journal = StartError::from(ExecutorError::Journal("disk full".into()));
        assert!(unavailable.is_unavailable());
        assert!(!journal.is_unavailable());
    }
}
