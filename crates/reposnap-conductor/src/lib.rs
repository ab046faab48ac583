//! Durable orchestration of the two-step clone: resolve a ref, then fetch a
//! shallow snapshot. Workflows are journaled so they survive restarts and can
//! be polled by id from any process.

pub mod activities;
pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod retry;
pub mod state;
pub mod status;
pub mod workflow;

pub use activities::{CloneActivities, GitActivities, MockActivities};
pub use config::{EngineConfig, RetryConfig};
pub use error::{ExecutorError, HandleError, StartError};
pub use executor::{
    Connector, DurableExecutor, JournalConnector, JournalExecutor, LocalConnector, LocalExecutor,
};
pub use registry::{WorkflowHandle, WorkflowRegistry};
pub use retry::ActivityRetryPolicy;
pub use state::machine::{ExecutionStatus, WorkflowState, WorkflowStatus};
pub use status::{classify, poll_status};
