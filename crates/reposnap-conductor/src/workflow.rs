use std::sync::Arc;

use reposnap_core::{CloneError, CloneResult};
use reposnap_git::mask_secrets;
use tokio::sync::watch;

use crate::activities::{CloneActivities, FETCH_ACTIVITY, RESOLVE_ACTIVITY};
use crate::retry::{run_with_retry, ActivityRetryPolicy};
use crate::state::machine::{transition, StateUpdate, WorkflowState, WorkflowStatus};
use crate::state::persist::StateStore;

/// Drives one clone workflow through its phases, journaling every step.
///
/// `run` picks up wherever `state.status` says, so the same code starts a
/// new workflow and resumes one found on disk after a restart.
pub struct WorkflowRunner {
    activities: Arc<dyn CloneActivities>,
    policy: ActivityRetryPolicy,
    store: StateStore,
}

impl WorkflowRunner {
    pub fn new(
        activities: Arc<dyn CloneActivities>,
        policy: ActivityRetryPolicy,
        store: StateStore,
    ) -> Self {
        Self {
            activities,
            policy,
            store,
        }
    }

    pub async fn run(
        &self,
        mut state: WorkflowState,
        publish: &watch::Sender<WorkflowState>,
    ) -> WorkflowState {
        loop {
            match state.status {
                WorkflowStatus::Started => {
                    tracing::info!(
                        workflow_id = %state.workflow_id,
                        repo = %mask_secrets(&state.request.repo_url),
                        git_ref = %state.request.git_ref,
                        "workflow started"
                    );
                    advance(&mut state, WorkflowStatus::Resolving, StateUpdate::default());
                }
                WorkflowStatus::Resolving => self.resolve(&mut state).await,
                WorkflowStatus::Fetching => self.fetch(&mut state).await,
                WorkflowStatus::Completed | WorkflowStatus::Failed => return state,
            }
            self.commit(&state, publish).await;
        }
    }

    async fn resolve(&self, state: &mut WorkflowState) {
        let request = state.request.clone();
        let done = run_with_retry(RESOLVE_ACTIVITY, &self.policy, |_| {
            self.activities
                .resolve_commit(&request.repo_url, &request.git_ref)
        })
        .await;
        let attempts = state.resolve_attempts + done.attempts;
        match done.outcome {
            Ok(sha) => {
                tracing::info!(workflow_id = %state.workflow_id, %sha, attempts, "ref resolved");
                advance(
                    state,
                    WorkflowStatus::Fetching,
                    StateUpdate {
                        sha: Some(sha),
                        resolve_attempts: Some(attempts),
                        ..Default::default()
                    },
                );
            }
            Err(e) => fail(state, e, |u| u.resolve_attempts = Some(attempts)),
        }
    }

    /// Re-entrant: a resumed fetch uses the journaled sha and a fresh directory.
    async fn fetch(&self, state: &mut WorkflowState) {
        let Some(sha) = state.sha.clone() else {
            fail(state, CloneError::internal("fetching without a resolved commit"), |_| {});
            return;
        };
        let repo_url = state.request.repo_url.clone();
        let done = run_with_retry(FETCH_ACTIVITY, &self.policy, |_| {
            self.activities.fetch_snapshot(&repo_url, &sha)
        })
        .await;
        let attempts = state.fetch_attempts + done.attempts;
        match done.outcome {
            Ok(snapshot) => {
                tracing::info!(
                    workflow_id = %state.workflow_id,
                    %sha,
                    path = %snapshot.path.display(),
                    attempts,
                    "workflow completed"
                );
                advance(
                    state,
                    WorkflowStatus::Completed,
                    StateUpdate {
                        result: Some(CloneResult {
                            sha: sha.clone(),
                            path: snapshot.path,
                        }),
                        fetch_attempts: Some(attempts),
                        completed_at: Some(now_rfc3339()),
                        ..Default::default()
                    },
                );
            }
            Err(e) => fail(state, e, |u| u.fetch_attempts = Some(attempts)),
        }
    }

    async fn commit(&self, state: &WorkflowState, publish: &watch::Sender<WorkflowState>) {
        let store = self.store.clone();
        let snapshot = state.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|saved| saved);
        if let Err(e) = saved {
            tracing::error!(workflow_id = %state.workflow_id, error = %format!("{e:#}"), "failed to journal workflow state");
        }
        publish.send_replace(state.clone());
    }
}

fn advance(state: &mut WorkflowState, to: WorkflowStatus, update: StateUpdate) {
    let from = state.status;
    if let Err(e) = transition(state, from, to, Some(update)) {
        tracing::error!(workflow_id = %state.workflow_id, error = %e, "rejected transition");
        state.status = WorkflowStatus::Failed;
        state.error = Some(CloneError::internal(e.to_string()));
        state.completed_at = Some(now_rfc3339());
        state.version += 1;
    }
}

fn fail(state: &mut WorkflowState, error: CloneError, extra: impl FnOnce(&mut StateUpdate)) {
    tracing::warn!(
        workflow_id = %state.workflow_id,
        phase = ?state.status,
        error = %mask_secrets(&error.to_string()),
        "workflow failed"
    );
    let mut update = StateUpdate {
        error: Some(error),
        completed_at: Some(now_rfc3339()),
        ..Default::default()
    };
    extra(&mut update);
    advance(state, WorkflowStatus::Failed, update);
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
