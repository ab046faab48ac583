use std::sync::Arc;
use std::time::Duration;

use reposnap_core::{CloneRequest, CloneResult, WorkflowId, WORKFLOW_TYPE};
use tokio::sync::{Mutex, OnceCell};

use crate::config::EngineConfig;
use crate::error::{ExecutorError, HandleError, StartError};
use crate::executor::{Connector, DurableExecutor};
use crate::state::machine::ExecutionStatus;

/// Starts clone workflows and hands out pollable handles.
///
/// The executor connection is opened on first use and cached. A failed
/// connect leaves the cache empty, and an `Unavailable` answer from a cached
/// executor clears it, so the next call tries a fresh connection.
pub struct WorkflowRegistry {
    connector: Arc<dyn Connector>,
    executor: Mutex<Option<Arc<dyn DurableExecutor>>>,
    task_queue: String,
    bind_attempts: u32,
    bind_backoff: Duration,
}

impl WorkflowRegistry {
    pub fn new(connector: Arc<dyn Connector>, config: &EngineConfig) -> Self {
        Self {
            connector,
            executor: Mutex::new(None),
            task_queue: config.task_queue.clone(),
            bind_attempts: config.bind_attempts,
            bind_backoff: config.bind_backoff(),
        }
    }

    /// Validate, assign a fresh id, submit, and return without waiting.
    pub async fn start(&self, request: CloneRequest) -> Result<WorkflowId, StartError> {
        request.validate()?;
        let id = WorkflowId::generate();
        let executor = self.executor().await?;
        let submitted = executor
            .start_workflow(&id, WORKFLOW_TYPE, &self.task_queue, request)
            .await;
        if let Err(e) = submitted {
            self.observe(&e).await;
            tracing::warn!(workflow_id = %id, error = %e, "failed to start workflow");
            return Err(e.into());
        }
        tracing::info!(workflow_id = %id, task_queue = %self.task_queue, "workflow submitted");
        Ok(id)
    }

    /// Open the executor connection now instead of on first use.
    pub async fn connect(&self) -> Result<(), ExecutorError> {
        self.executor().await.map(|_| ())
    }

    /// Never fails: binding happens on the handle's first use.
    pub fn get_handle(self: &Arc<Self>, id: WorkflowId) -> WorkflowHandle {
        WorkflowHandle {
            id,
            registry: self.clone(),
            bound: OnceCell::new(),
        }
    }

    async fn executor(&self) -> Result<Arc<dyn DurableExecutor>, ExecutorError> {
        let mut cached = self.executor.lock().await;
        if let Some(executor) = cached.as_ref() {
            return Ok(executor.clone());
        }
        match self.connector.connect().await {
            Ok(executor) => {
                *cached = Some(executor.clone());
                Ok(executor)
            }
            Err(e) => {
                tracing::warn!(error = %e, "executor connection failed");
                Err(e)
            }
        }
    }

    async fn observe(&self, err: &ExecutorError) {
        if matches!(err, ExecutorError::Unavailable(_)) {
            self.executor.lock().await.take();
        }
    }
}

/// Capability bound to one workflow id.
///
/// The first `result()`/`describe()` binds the handle to the executor,
/// retrying while the executor is unreachable or the workflow is not yet
/// visible. Callers cannot tell a late-binding handle from a bound one.
pub struct WorkflowHandle {
    id: WorkflowId,
    registry: Arc<WorkflowRegistry>,
    bound: OnceCell<Arc<dyn DurableExecutor>>,
}

impl WorkflowHandle {
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    /// Wait for the terminal result or the workflow's terminal error.
    pub async fn result(&self) -> Result<CloneResult, HandleError> {
        let executor = self.bound().await?;
        let outcome = executor.await_result(&self.id).await;
        if let Err(HandleError::Unavailable(reason)) = &outcome {
            self.registry
                .observe(&ExecutorError::Unavailable(reason.clone()))
                .await;
        }
        outcome
    }

    /// Coarse status without waiting.
    pub async fn describe(&self) -> Result<ExecutionStatus, HandleError> {
        let executor = self.bound().await?;
        match executor.describe(&self.id).await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.registry.observe(&e).await;
                Err(e.into())
            }
        }
    }

    async fn bound(&self) -> Result<Arc<dyn DurableExecutor>, HandleError> {
        self.bound.get_or_try_init(|| self.bind()).await.cloned()
    }

    async fn bind(&self) -> Result<Arc<dyn DurableExecutor>, HandleError> {
        let attempts = self.registry.bind_attempts.max(1);
        let mut last = HandleError::NotFound(self.id.clone());
        for attempt in 1..=attempts {
            match self.registry.executor().await {
                Ok(executor) => match executor.describe(&self.id).await {
                    Ok(_) => return Ok(executor),
                    Err(e) => {
                        self.registry.observe(&e).await;
                        last = e.into();
                    }
                },
                Err(e) => last = e.into(),
            }
            if attempt < attempts {
                tracing::debug!(workflow_id = %self.id, attempt, error = %last, "handle not bound yet, retrying");
                tokio::time::sleep(self.registry.bind_backoff).await;
            }
        }
        Err(last)
    }
}
