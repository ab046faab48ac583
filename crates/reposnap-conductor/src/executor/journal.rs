use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reposnap_core::{CloneRequest, CloneResult, WorkflowId};

use crate::error::{ExecutorError, HandleError};
use crate::executor::{Connector, DurableExecutor};
use crate::state::machine::{ExecutionStatus, WorkflowState};
use crate::state::persist::StateStore;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Read-only view over workflow journals. Lets any process poll any id
/// without owning the executor lock.
#[derive(Debug, Clone)]
pub struct JournalExecutor {
    store: StateStore,
    poll_interval: Duration,
}

impl JournalExecutor {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn load(&self, id: &WorkflowId) -> Result<WorkflowState, ExecutorError> {
        self.store
            .load(id)
            .map_err(|e| ExecutorError::journal(&e))?
            .ok_or_else(|| ExecutorError::NotFound(id.clone()))
    }
}

#[async_trait::async_trait]
impl DurableExecutor for JournalExecutor {
    async fn start_workflow(
        &self,
        _id: &WorkflowId,
        _workflow_type: &str,
        _task_queue: &str,
        _request: CloneRequest,
    ) -> Result<(), ExecutorError> {
        Err(ExecutorError::unavailable("journal view is read-only"))
    }

    async fn describe(&self, id: &WorkflowId) -> Result<ExecutionStatus, ExecutorError> {
        Ok(self.load(id)?.execution_status())
    }

    async fn await_result(&self, id: &WorkflowId) -> Result<CloneResult, HandleError> {
        loop {
            if let Some(outcome) = self.load(id)?.outcome() {
                return outcome.map_err(HandleError::Workflow);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Connects to the journal directory. Fails if it cannot be read.
#[derive(Debug, Clone)]
pub struct JournalConnector {
    state_dir: PathBuf,
}

impl JournalConnector {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for JournalConnector {
    async fn connect(&self) -> Result<Arc<dyn DurableExecutor>, ExecutorError> {
        if !self.state_dir.is_dir() {
            return Err(ExecutorError::unavailable(format!(
                "no workflow journal at {}",
                self.state_dir.display()
            )));
        }
        Ok(Arc::new(JournalExecutor::new(StateStore::new(&self.state_dir))))
    }
}
