//! The durable executor seam. The registry only ever talks to these traits.

pub mod journal;
pub mod local;

pub use journal::{JournalConnector, JournalExecutor};
pub use local::{LocalConnector, LocalExecutor};

use std::sync::Arc;

use reposnap_core::{CloneRequest, CloneResult, WorkflowId};

use crate::error::{ExecutorError, HandleError};
use crate::state::machine::ExecutionStatus;

/// Durable, at-least-once execution of named workflows, queryable by id.
#[async_trait::async_trait]
pub trait DurableExecutor: Send + Sync {
    /// Submit and return without waiting for the workflow to run.
    async fn start_workflow(
        &self,
        id: &WorkflowId,
        workflow_type: &str,
        task_queue: &str,
        request: CloneRequest,
    ) -> Result<(), ExecutorError>;

    /// Coarse status, without waiting.
    async fn describe(&self, id: &WorkflowId) -> Result<ExecutionStatus, ExecutorError>;

    /// Wait for a terminal state.
    async fn await_result(&self, id: &WorkflowId) -> Result<CloneResult, HandleError>;
}

/// Establishes the executor "connection". May fail; callers retry.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DurableExecutor>, ExecutorError>;
}
