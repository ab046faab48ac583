use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reposnap_core::{CloneError, CommitSha, Snapshot};
use reposnap_git::{CommandRunner, RefResolver, SnapshotFetcher, SystemRunner, WorkdirAllocator};

use crate::config::EngineConfig;

pub const RESOLVE_ACTIVITY: &str = "resolve_commit";
pub const FETCH_ACTIVITY: &str = "fetch_snapshot";

/// The two retriable units of work a clone workflow is made of.
/// Implemented by GitActivities (real) and MockActivities (tests).
#[async_trait::async_trait]
pub trait CloneActivities: Send + Sync {
    /// Read-only; safe to repeat.
    async fn resolve_commit(&self, repo_url: &str, git_ref: &str) -> Result<CommitSha, CloneError>;

    /// Must use a fresh directory on every call, retries included.
    async fn fetch_snapshot(&self, repo_url: &str, sha: &CommitSha) -> Result<Snapshot, CloneError>;
}

/// Activities backed by the git CLI.
#[derive(Clone)]
pub struct GitActivities {
    resolver: RefResolver,
    fetcher: SnapshotFetcher,
}

impl GitActivities {
    pub fn new(resolver: RefResolver, fetcher: SnapshotFetcher) -> Self {
        Self { resolver, fetcher }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let timeout = config.git_timeout();
        Self::new(
            RefResolver::new(runner.clone()).with_timeout(timeout),
            SnapshotFetcher::new(runner, WorkdirAllocator::new(&config.workdir_root))
                .with_timeout(timeout),
        )
    }
}

#[async_trait::async_trait]
impl CloneActivities for GitActivities {
    async fn resolve_commit(&self, repo_url: &str, git_ref: &str) -> Result<CommitSha, CloneError> {
        self.resolver.resolve_commit(repo_url, git_ref).await
    }

    async fn fetch_snapshot(&self, repo_url: &str, sha: &CommitSha) -> Result<Snapshot, CloneError> {
        self.fetcher.fetch_snapshot(repo_url, sha, None).await
    }
}

/// Commit id MockActivities resolves to when nothing is scripted.
pub const MOCK_SHA: &str = "0123456789abcdef0123456789abcdef01234567";

/// Scripted activities for tests. Replies are popped in order; an empty
/// script succeeds with [`MOCK_SHA`] and a fresh made-up path.
#[derive(Debug, Default)]
pub struct MockActivities {
    resolve: Mutex<VecDeque<Result<CommitSha, CloneError>>>,
    fetch: Mutex<VecDeque<Result<Snapshot, CloneError>>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl MockActivities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_resolve(&self, reply: Result<CommitSha, CloneError>) -> &Self {
        lock(&self.resolve).push_back(reply);
        self
    }

    pub fn push_fetch(&self, reply: Result<Snapshot, CloneError>) -> &Self {
        lock(&self.fetch).push_back(reply);
        self
    }

    /// Make every call sleep first, to observe a workflow mid-flight.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// `"resolve_commit <url> <ref>"` / `"fetch_snapshot <url> <sha>"` per call.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    async fn enter(&self, call: String) {
        lock(&self.calls).push(call);
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait::async_trait]
impl CloneActivities for MockActivities {
    async fn resolve_commit(&self, repo_url: &str, git_ref: &str) -> Result<CommitSha, CloneError> {
        self.enter(format!("{RESOLVE_ACTIVITY} {repo_url} {git_ref}")).await;
        match lock(&self.resolve).pop_front() {
            Some(reply) => reply,
            None => CommitSha::parse(MOCK_SHA).map_err(|e| CloneError::internal(e.to_string())),
        }
    }

    async fn fetch_snapshot(&self, repo_url: &str, sha: &CommitSha) -> Result<Snapshot, CloneError> {
        self.enter(format!("{FETCH_ACTIVITY} {repo_url} {sha}")).await;
        let scripted = lock(&self.fetch).pop_front();
        scripted.unwrap_or_else(|| {
            let n = lock(&self.calls).len();
            Ok(Snapshot {
                path: PathBuf::from(format!("/tmp/reposnap-mock/repo-{n}")),
            })
        })
    }
}
