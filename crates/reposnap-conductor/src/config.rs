use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::ActivityRetryPolicy;

pub const DEFAULT_TASK_QUEUE: &str = "context-task-queue";

/// Engine settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub state_dir: PathBuf,
    pub task_queue: String,
    pub workdir_root: PathBuf,
    pub git_timeout_secs: u64,
    pub retry: RetryConfig,
    pub bind_attempts: u32,
    pub bind_backoff_ms: u64,
    pub result_wait_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: reposnap_store::default_state_dir(),
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            workdir_root: std::env::temp_dir(),
            git_timeout_secs: 60,
            retry: RetryConfig::default(),
            bind_attempts: 5,
            bind_backoff_ms: 200,
            result_wait_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub per_attempt_timeout_secs: u64,
    pub backoff_coefficient: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            per_attempt_timeout_secs: 300,
            backoff_coefficient: 2.0,
            max_backoff_ms: 200_000,
        }
    }
}

impl EngineConfig {
    /// Defaults, overlaid with the JSON file at `path` if one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> ActivityRetryPolicy {
        ActivityRetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            per_attempt_timeout: Duration::from_secs(self.retry.per_attempt_timeout_secs),
            backoff_coefficient: self.retry.backoff_coefficient,
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn bind_backoff(&self) -> Duration {
        Duration::from_millis(self.bind_backoff_ms)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_millis(self.result_wait_ms)
    }
}
