use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use reposnap_core::{CloneError, CloneRequest, CloneResult, CommitSha, WorkflowId, WORKFLOW_TYPE};

// ── Status enums ──

/// Phase of one clone workflow. `Resolving` and `Fetching` are both "running".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Started,
    Resolving,
    Fetching,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

/// Coarse status reported by `describe`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl From<WorkflowStatus> for ExecutionStatus {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Completed => ExecutionStatus::Completed,
            WorkflowStatus::Failed => ExecutionStatus::Failed,
            _ => ExecutionStatus::Running,
        }
    }
}

// ── State types ──

/// Journaled state of one workflow. `result` never leaves the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub workflow_type: String,
    pub task_queue: String,
    pub request: CloneRequest,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<CommitSha>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CloneResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloneError>,
    #[serde(default)]
    pub resolve_attempts: u32,
    #[serde(default)]
    pub fetch_attempts: u32,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub version: u32,
}

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(WorkflowStatus, &[WorkflowStatus])] = &[
    (
        WorkflowStatus::Started,
        &[WorkflowStatus::Resolving, WorkflowStatus::Failed],
    ),
    (
        WorkflowStatus::Resolving,
        &[WorkflowStatus::Fetching, WorkflowStatus::Failed],
    ),
    (
        WorkflowStatus::Fetching,
        &[WorkflowStatus::Completed, WorkflowStatus::Failed],
    ),
    // Completed and Failed are terminal
];

fn is_valid_transition(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── Side effects ──

/// Optional side-effect data applied during a transition.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub sha: Option<CommitSha>,
    pub result: Option<CloneResult>,
    pub error: Option<CloneError>,
    pub resolve_attempts: Option<u32>,
    pub fetch_attempts: Option<u32>,
    pub completed_at: Option<String>,
}

impl StateUpdate {
    pub fn apply(self, state: &mut WorkflowState) {
        if self.sha.is_some() {
            state.sha = self.sha;
        }
        if self.result.is_some() {
            state.result = self.result;
        }
        if self.error.is_some() {
            state.error = self.error;
        }
        if let Some(v) = self.resolve_attempts {
            state.resolve_attempts = v;
        }
        if let Some(v) = self.fetch_attempts {
            state.fetch_attempts = v;
        }
        if let Some(v) = self.completed_at {
            state.completed_at = Some(v);
        }
    }
}

// ── CAS-guarded transition ──

/// Move `state` from `from` to `to`, applying side effects.
/// Returns Ok(true) on success, Ok(false) on CAS miss (current != from).
pub fn transition(
    state: &mut WorkflowState,
    from: WorkflowStatus,
    to: WorkflowStatus,
    side_effect: Option<StateUpdate>,
) -> Result<bool> {
    if state.status != from {
        return Ok(false);
    }
    if !is_valid_transition(from, to) {
        bail!("invalid transition: {} {from:?} → {to:?}", state.workflow_id);
    }
    state.status = to;
    if let Some(update) = side_effect {
        update.apply(state);
    }
    state.version += 1;
    Ok(true)
}

// ── WorkflowState methods ──

impl WorkflowState {
    pub fn new(
        workflow_id: WorkflowId,
        task_queue: &str,
        request: CloneRequest,
        started_at: String,
    ) -> Self {
        WorkflowState {
            workflow_id,
            workflow_type: WORKFLOW_TYPE.to_string(),
            task_queue: task_queue.to_string(),
            request,
            status: WorkflowStatus::Started,
            sha: None,
            result: None,
            error: None,
            resolve_attempts: 0,
            fetch_attempts: 0,
            started_at,
            completed_at: None,
            version: 0,
        }
    }

    pub fn execution_status(&self) -> ExecutionStatus {
        self.status.into()
    }

    /// Terminal outcome, or None while the workflow is still running.
    pub fn outcome(&self) -> Option<Result<CloneResult, CloneError>> {
        match self.status {
            WorkflowStatus::Completed => Some(
                self.result
                    .clone()
                    .ok_or_else(|| CloneError::internal("completed workflow has no result")),
            ),
            WorkflowStatus::Failed => Some(Err(self
                .error
                .clone()
                .unwrap_or_else(|| CloneError::internal("failed workflow has no error")))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SHA: &str = "89abcdef0123456789abcdef0123456789abcdef";

    fn new_state() -> WorkflowState {
        WorkflowState::new(
            WorkflowId::parse("clone-1").unwrap(),
            "context-task-queue",
            CloneRequest::new("https://example/repo.git", "main"),
            "2026-01-01T00:00:00Z".into(),
        )
    }

    #[test]
    fn new_state_is_started() {
        let state = new_state();
        assert_eq!(state.status, WorkflowStatus::Started);
        assert_eq!(state.workflow_type, "CloneRepoWorkflow");
        assert_eq!(state.execution_status(), ExecutionStatus::Running);
        assert!(state.outcome().is_none());
        assert_eq!(state.version, 0);
    }

    #[test]
    fn happy_path_transitions() {
        let mut state = new_state();
        let sha = CommitSha::parse(SHA).unwrap();
        assert!(transition(&mut state, WorkflowStatus::Started, WorkflowStatus::Resolving, None).unwrap());
        assert!(transition(
            &mut state,
            WorkflowStatus::Resolving,
            WorkflowStatus::Fetching,
            Some(StateUpdate {
                sha: Some(sha.clone()),
                resolve_attempts: Some(1),
                ..Default::default()
            }),
        )
        .unwrap());
        assert!(transition(
            &mut state,
            WorkflowStatus::Fetching,
            WorkflowStatus::Completed,
            Some(StateUpdate {
                result: Some(CloneResult {
                    sha: sha.clone(),
                    path: PathBuf::from("/tmp/repo-x"),
                }),
                completed_at: Some("2026-01-01T00:00:05Z".into()),
                ..Default::default()
            }),
        )
        .unwrap());

        assert_eq!(state.version, 3);
        assert_eq!(state.sha.as_ref(), Some(&sha));
        assert_eq!(state.execution_status(), ExecutionStatus::Completed);
        assert_eq!(state.outcome().unwrap().unwrap().sha, sha);
    }

    #[test]
    fn cas_miss_returns_false() {
        let mut state = new_state();
        let ok = transition(&mut state, WorkflowStatus::Resolving, WorkflowStatus::Fetching, None).unwrap();
        assert!(!ok);
        assert_eq!(state.status, WorkflowStatus::Started);
        assert_eq!(state.version, 0);
    }

    #[test]
    fn fetch_cannot_precede_resolve() {
        let mut state = new_state();
        assert!(transition(&mut state, WorkflowStatus::Started, WorkflowStatus::Fetching, None).is_err());
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        let mut state = new_state();
        transition(
            &mut state,
            WorkflowStatus::Started,
            WorkflowStatus::Failed,
            Some(StateUpdate {
                error: Some(CloneError::internal("boom")),
                ..Default::default()
            }),
        )
        .unwrap();
        for to in [WorkflowStatus::Resolving, WorkflowStatus::Started, WorkflowStatus::Completed] {
            assert!(transition(&mut state, WorkflowStatus::Failed, to, None).is_err());
        }
        assert_eq!(state.outcome().unwrap().unwrap_err(), CloneError::internal("boom"));
    }

    #[test]
    fn execution_status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&ExecutionStatus::Running).unwrap(), "\"RUNNING\"");
    }
}
