use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reposnap_core::{CloneError, CommitSha, Snapshot};

use crate::process::{CommandRunner, CommandSpec};
use crate::workdir::WorkdirAllocator;
use crate::{git, DEFAULT_GIT_TIMEOUT};

/// Prefix for directories allocated by the fetcher.
pub const SNAPSHOT_PREFIX: &str = "repo";

/// Shallow, single-commit checkout of a remote into an isolated directory.
#[derive(Clone)]
pub struct SnapshotFetcher {
    runner: Arc<dyn CommandRunner>,
    workdirs: WorkdirAllocator,
    timeout: Duration,
}

impl SnapshotFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>, workdirs: WorkdirAllocator) -> Self {
        Self {
            runner,
            workdirs,
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// init → remote add → fetch --depth 1 <sha> → checkout <sha>, all in `dest`.
    ///
    /// Without `dest` a fresh directory is allocated; if any step fails that
    /// directory is removed again and the step's error is returned.
    pub async fn fetch_snapshot(
        &self,
        repo_url: &str,
        sha: &CommitSha,
        dest: Option<&Path>,
    ) -> Result<Snapshot, CloneError> {
        let (root, allocated) = self.prepare(dest).await?;

        match self.run_steps(repo_url, sha, &root).await {
            Ok(()) => Ok(Snapshot { path: root }),
            Err(e) => {
                if allocated {
                    discard(root).await;
                }
                Err(e)
            }
        }
    }

    /// Directory setup touches the filesystem, so it runs off the async workers.
    async fn prepare(&self, dest: Option<&Path>) -> Result<(PathBuf, bool), CloneError> {
        let workdirs = self.workdirs.clone();
        let dest = dest.map(Path::to_path_buf);
        tokio::task::spawn_blocking(move || match dest {
            Some(d) => std::fs::create_dir_all(&d).map(|()| (d, false)),
            None => workdirs.allocate(SNAPSHOT_PREFIX).map(|p| (p, true)),
        })
        .await
        .map_err(|e| CloneError::internal(format!("workdir setup task failed: {e}")))?
        .map_err(CloneError::from)
    }

    async fn run_steps(&self, repo_url: &str, sha: &CommitSha, root: &Path) -> Result<(), CloneError> {
        for spec in snapshot_steps(repo_url, sha) {
            let spec = spec.cwd(root).timeout(self.timeout);
            self.runner.run(&spec).await?;
        }
        Ok(())
    }
}

fn snapshot_steps(repo_url: &str, sha: &CommitSha) -> [CommandSpec; 4] {
    let sha = sha.as_str();
    [
        git(["init", "--quiet"]),
        git(["remote", "add", "origin", repo_url]),
        git(["fetch", "--quiet", "--depth", "1", "origin", sha]),
        git(["-c", "advice.detachedHead=false", "checkout", "--quiet", sha]),
    ]
}

async fn discard(path: PathBuf) {
    let removed = tokio::task::spawn_blocking({
        let path = path.clone();
        move || std::fs::remove_dir_all(path)
    })
    .await;
    match removed {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial snapshot");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cleanup task failed");
        }
    }
}
