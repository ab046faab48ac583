use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use reposnap_core::ProcessError;
use tokio::process::Command;

use crate::redact::mask_secrets;
use crate::DEFAULT_GIT_TIMEOUT;

/// One external command: program, args, optional working dir, hard timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn cwd(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line for logs, with credentials masked.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        mask_secrets(&line)
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn stdout(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

/// Runs external commands. No retry at this layer.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// Spawns real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "running command");

        // Dropping the output future on timeout drops the child, which kills it.
        match tokio::time::timeout(spec.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.status.success() {
                    Ok(ProcessOutput { stdout, stderr })
                } else {
                    tracing::debug!(
                        command = %spec.display(),
                        code = ?output.status.code(),
                        stderr = %mask_secrets(stderr.trim()),
                        "command failed"
                    );
                    Err(ProcessError::exit(
                        &spec.program,
                        output.status.code(),
                        stdout,
                        stderr,
                    ))
                }
            }
            Ok(Err(e)) => Err(ProcessError::launch(&spec.program, &e)),
            Err(_) => {
                tracing::warn!(command = %spec.display(), timeout = ?spec.timeout, "command timed out");
                Err(ProcessError::timeout(&spec.program, spec.timeout))
            }
        }
    }
}

/// Scripted runner for tests. Records every call and pops canned replies in order.
/// When the script is exhausted it answers with empty stdout.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: Mutex<VecDeque<Result<ProcessOutput, ProcessError>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<ProcessOutput, ProcessError>) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    pub fn push_stdout(&self, stdout: &str) -> &Self {
        self.push(Ok(ProcessOutput::stdout(stdout)))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(ProcessOutput::default()))
    }
}
