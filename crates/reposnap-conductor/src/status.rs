//! Maps a workflow handle onto the public status model. This is the only
//! place terminal errors are classified, and the only place `path` is dropped.

use std::time::Duration;

use reposnap_core::{CloneError, CloneResult, CloneStatus, ErrorClass, PublicResult, WorkflowId};

use crate::error::HandleError;
use crate::registry::WorkflowHandle;
use crate::state::machine::ExecutionStatus;

/// Classify by error variant, never by message text.
pub fn classify(err: &HandleError) -> ErrorClass {
    match err {
        HandleError::Workflow(CloneError::RefNotFound { .. }) => ErrorClass::InvalidRef,
        HandleError::Unavailable(_) => ErrorClass::ServiceUnavailable,
        HandleError::NotFound(_) | HandleError::Workflow(_) => ErrorClass::WorkflowFailed,
    }
}

/// Give `result()` up to `result_wait` to settle; if it has not, ask
/// `describe()` whether the workflow is still running.
pub async fn poll_status(handle: &WorkflowHandle, result_wait: Duration) -> CloneStatus {
    let id = handle.id().clone();
    match tokio::time::timeout(result_wait, handle.result()).await {
        Ok(outcome) => render(id, outcome),
        Err(_) => match handle.describe().await {
            Ok(ExecutionStatus::Running) => CloneStatus::Running { workflow_id: id },
            // Finished between the two calls: the result is ready now.
            Ok(ExecutionStatus::Completed | ExecutionStatus::Failed) => {
                render(id, handle.result().await)
            }
            Err(e) => failed(id, &e),
        },
    }
}

fn render(workflow_id: WorkflowId, outcome: Result<CloneResult, HandleError>) -> CloneStatus {
    match outcome {
        Ok(result) => CloneStatus::Completed {
            workflow_id,
            result: PublicResult { sha: result.sha },
        },
        Err(e) => failed(workflow_id, &e),
    }
}

fn failed(workflow_id: WorkflowId, err: &HandleError) -> CloneStatus {
    let class = classify(err);
    tracing::info!(workflow_id = %workflow_id, ?class, error = %reposnap_git::mask_secrets(&err.to_string()), "workflow reported as failed");
    CloneStatus::failed(workflow_id, class)
}
