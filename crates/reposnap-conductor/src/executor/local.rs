use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use reposnap_core::{CloneError, CloneRequest, CloneResult, WorkflowId, WORKFLOW_TYPE};
use reposnap_store::LockGuard;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::activities::CloneActivities;
use crate::config::EngineConfig;
use crate::error::{ExecutorError, HandleError};
use crate::executor::journal::JournalExecutor;
use crate::executor::{Connector, DurableExecutor};
use crate::state::machine::{ExecutionStatus, WorkflowState};
use crate::state::persist::StateStore;
use crate::workflow::{now_rfc3339, WorkflowRunner};

/// Live workflows owned by this executor. An entry leaves once its terminal
/// state is journaled; from then on the journal answers for it.
type Index = Arc<Mutex<HashMap<WorkflowId, watch::Receiver<WorkflowState>>>>;

/// In-process executor journaling to `state_dir`.
///
/// Holds `state_dir/executor.lock` for its whole life, so one directory is
/// driven by at most one executor. Every workflow runs as its own tokio task
/// and is stopped when the executor is dropped; the next executor to open the
/// directory resumes it from the journal.
pub struct LocalExecutor {
    store: StateStore,
    task_queue: String,
    runner: Arc<WorkflowRunner>,
    journal: JournalExecutor,
    workflows: Index,
    tasks: CancellationToken,
    _stop_tasks: DropGuard,
    _lock: LockGuard,
}

impl LocalExecutor {
    /// Take the lock and resume every unfinished workflow. Must be called
    /// from within a tokio runtime.
    pub fn open(
        config: &EngineConfig,
        activities: Arc<dyn CloneActivities>,
    ) -> Result<Self, ExecutorError> {
        let store = StateStore::new(&config.state_dir);
        std::fs::create_dir_all(store.dir()).map_err(|e| {
            ExecutorError::unavailable(format!("creating {}: {e}", store.dir().display()))
        })?;
        let lock = reposnap_store::try_lock_file(&store.lock_path())
            .map_err(|e| ExecutorError::unavailable(format!("{e:#}")))?;

        let tasks = CancellationToken::new();
        let executor = Self {
            runner: Arc::new(WorkflowRunner::new(
                activities,
                config.retry_policy(),
                store.clone(),
            )),
            journal: JournalExecutor::new(store.clone()),
            store,
            task_queue: config.task_queue.clone(),
            workflows: Arc::new(Mutex::new(HashMap::new())),
            _stop_tasks: tasks.clone().drop_guard(),
            tasks,
            _lock: lock,
        };

        let pending: Vec<WorkflowState> = executor
            .store
            .list()
            .map_err(|e| ExecutorError::unavailable(format!("{e:#}")))?
            .into_iter()
            .filter(|s| !s.status.is_terminal())
            .collect();
        for state in pending {
            tracing::info!(workflow_id = %state.workflow_id, phase = ?state.status, "resuming workflow");
            executor.spawn(state);
        }
        tracing::info!(state_dir = %executor.store.dir().display(), task_queue = %executor.task_queue, "executor open");
        Ok(executor)
    }

    fn spawn(&self, state: WorkflowState) {
        let id = state.workflow_id.clone();
        let (tx, rx) = watch::channel(state.clone());
        lock_index(&self.workflows).insert(id.clone(), rx);

        let runner = self.runner.clone();
        let store = self.store.clone();
        let workflows = self.workflows.clone();
        let stop = self.tasks.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    tracing::debug!(workflow_id = %id, "executor closed, workflow left for resume");
                }
                _ = runner.run(state, &tx) => {
                    if journaled_terminal(store, id.clone()).await {
                        lock_index(&workflows).remove(&id);
                    } else {
                        tracing::warn!(workflow_id = %id, "terminal state not journaled, keeping it in memory");
                    }
                }
            }
        });
    }

    fn receiver(&self, id: &WorkflowId) -> Option<watch::Receiver<WorkflowState>> {
        lock_index(&self.workflows).get(id).cloned()
    }

    /// Number of workflows answered from memory rather than the journal.
    pub fn live_workflows(&self) -> usize {
        lock_index(&self.workflows).len()
    }
}

fn lock_index(
    index: &Mutex<HashMap<WorkflowId, watch::Receiver<WorkflowState>>>,
) -> MutexGuard<'_, HashMap<WorkflowId, watch::Receiver<WorkflowState>>> {
    index.lock().unwrap_or_else(|e| e.into_inner())
}

async fn journaled_terminal(store: StateStore, id: WorkflowId) -> bool {
    let loaded = tokio::task::spawn_blocking(move || store.load(&id)).await;
    matches!(loaded, Ok(Ok(Some(state))) if state.status.is_terminal())
}

#[async_trait::async_trait]
impl DurableExecutor for LocalExecutor {
    async fn start_workflow(
        &self,
        id: &WorkflowId,
        workflow_type: &str,
        task_queue: &str,
        request: CloneRequest,
    ) -> Result<(), ExecutorError> {
        if workflow_type != WORKFLOW_TYPE {
            return Err(ExecutorError::UnknownWorkflowType(workflow_type.to_string()));
        }
        if task_queue != self.task_queue {
            return Err(ExecutorError::UnknownTaskQueue(task_queue.to_string()));
        }
        if self.receiver(id).is_some() || self.store.state_path(id).exists() {
            return Err(ExecutorError::AlreadyExists(id.clone()));
        }

        let state = WorkflowState::new(id.clone(), task_queue, request, now_rfc3339());
        let store = self.store.clone();
        let first = state.clone();
        tokio::task::spawn_blocking(move || store.save(&first))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|saved| saved)
            .map_err(|e| ExecutorError::journal(&e))?;
        self.spawn(state);
        Ok(())
    }

    async fn describe(&self, id: &WorkflowId) -> Result<ExecutionStatus, ExecutorError> {
        match self.receiver(id) {
            Some(rx) => Ok(rx.borrow().execution_status()),
            None => self.journal.describe(id).await,
        }
    }

    async fn await_result(&self, id: &WorkflowId) -> Result<CloneResult, HandleError> {
        let Some(mut rx) = self.receiver(id) else {
            return self.journal.await_result(id).await;
        };
        let outcome = match rx.wait_for(|s| s.status.is_terminal()).await {
            Ok(state) => state.outcome(),
            Err(_) => None,
        };
        outcome
            .unwrap_or_else(|| Err(CloneError::internal("workflow task ended before a terminal state")))
            .map_err(HandleError::Workflow)
    }
}

/// Opens a [`LocalExecutor`] over the configured activities.
///
/// The executor lives in this process, so reconnecting hands back the one
/// already open instead of starting a second copy of every live workflow.
pub struct LocalConnector {
    config: EngineConfig,
    activities: Arc<dyn CloneActivities>,
    open: tokio::sync::Mutex<Option<Arc<LocalExecutor>>>,
}

impl LocalConnector {
    pub fn new(config: EngineConfig, activities: Arc<dyn CloneActivities>) -> Self {
        Self {
            config,
            activities,
            open: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl Connector for LocalConnector {
    async fn connect(&self) -> Result<Arc<dyn DurableExecutor>, ExecutorError> {
        let mut open = self.open.lock().await;
        if let Some(executor) = open.as_ref() {
            return Ok(executor.clone());
        }
        let executor = Arc::new(LocalExecutor::open(&self.config, self.activities.clone())?);
        *open = Some(executor.clone());
        Ok(executor)
    }
}
