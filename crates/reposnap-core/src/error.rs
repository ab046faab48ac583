use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How a subprocess call went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessErrorKind {
    /// The program could not be started at all.
    Launch,
    /// The wall-clock timeout fired and the child was killed.
    Timeout,
    /// The program ran and exited unsuccessfully.
    Exit,
}

/// Failure of a single external command. Carries captured output for operators.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProcessError {
    pub kind: ProcessErrorKind,
    pub program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub message: String,
}

impl ProcessError {
    pub fn launch(program: &str, cause: &std::io::Error) -> Self {
        Self {
            kind: ProcessErrorKind::Launch,
            program: program.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: launch_message(program, &cause.to_string()),
        }
    }

    pub fn timeout(program: &str, timeout: Duration) -> Self {
        Self {
            kind: ProcessErrorKind::Timeout,
            program: program.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: format!("process timed out after {timeout:?} for command: {program}"),
        }
    }

    /// Non-zero exit. The message is stderr when there is any.
    pub fn exit(program: &str, exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let trimmed = stderr.trim();
        let message = if trimmed.is_empty() {
            let status = exit_code.map_or("signal".to_string(), |c| format!("exit status {c}"));
            launch_message(program, &status)
        } else {
            trimmed.to_string()
        };
        Self {
            kind: ProcessErrorKind::Exit,
            program: program.to_string(),
            exit_code,
            stdout,
            stderr,
            message,
        }
    }
}

fn launch_message(program: &str, cause: &str) -> String {
    format!("failed to execute \"{program}\": {cause}")
}

/// Terminal (or per-attempt) error of a clone activity or workflow.
///
/// Serializable so a failed workflow can be reported after a restart.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CloneError {
    /// No tier of the ref lookup produced a commit. Deterministic, never retried.
    #[error("ref not found: {git_ref}")]
    RefNotFound { git_ref: String },
    #[error(transparent)]
    Process(ProcessError),
    #[error("activity {activity} timed out after {timeout_ms}ms")]
    ActivityTimeout { activity: String, timeout_ms: u64 },
    #[error("malformed ref listing line: {line:?}")]
    MalformedListing { line: String },
    #[error("io error: {message}")]
    Io { message: String },
    #[error("{message}")]
    Internal { message: String },
}

impl CloneError {
    pub fn ref_not_found(git_ref: &str) -> Self {
        Self::RefNotFound {
            git_ref: git_ref.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Only a missing ref is deterministic; everything else may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RefNotFound { .. })
    }
}

impl From<ProcessError> for CloneError {
    fn from(err: ProcessError) -> Self {
        Self::Process(err)
    }
}

impl From<std::io::Error> for CloneError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
