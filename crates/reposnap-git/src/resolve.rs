use std::sync::Arc;
use std::time::Duration;

use reposnap_core::{CloneError, CommitSha};

use crate::process::CommandRunner;
use crate::{git, DEFAULT_GIT_TIMEOUT};

/// Lookup tiers, tried in this order. Earlier tiers win ties between a
/// branch and a tag of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The ref exactly as given (`refs/...`, `HEAD`, or a bare name).
    Literal,
    /// `refs/heads/<ref>`
    Head,
    /// `refs/tags/<ref>`
    Tag,
}

const TIERS: [Tier; 3] = [Tier::Literal, Tier::Head, Tier::Tag];

impl Tier {
    pub fn pattern(self, git_ref: &str) -> String {
        match self {
            Tier::Literal => git_ref.to_string(),
            Tier::Head => format!("refs/heads/{git_ref}"),
            Tier::Tag => format!("refs/tags/{git_ref}"),
        }
    }

    /// Only the exploratory fallbacks swallow lookup errors.
    fn suppresses_errors(self) -> bool {
        !matches!(self, Tier::Literal)
    }
}

/// Outcome of one remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefResolution {
    CommitId(CommitSha),
    NotFound,
}

/// Resolves a human ref to a full commit id with `git ls-remote`.
#[derive(Clone)]
pub struct RefResolver {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl RefResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `git_ref` on `repo_url`. Read-only, safe to repeat.
    ///
    /// A tier-1 lookup error propagates so the activity layer can retry it;
    /// tier-2/3 errors count as "nothing found". A ref no tier lists is
    /// `RefNotFound`, even when it looks like a full commit id.
    pub async fn resolve_commit(
        &self,
        repo_url: &str,
        git_ref: &str,
    ) -> Result<CommitSha, CloneError> {
        for tier in TIERS {
            let outcome = match self.lookup(repo_url, &tier.pattern(git_ref)).await {
                Ok(outcome) => outcome,
                Err(e) if tier.suppresses_errors() => {
                    tracing::debug!(?tier, git_ref, error = %e, "ref lookup failed, treating as empty");
                    RefResolution::NotFound
                }
                Err(e) => return Err(e),
            };
            if let RefResolution::CommitId(sha) = outcome {
                tracing::debug!(?tier, git_ref, %sha, "ref resolved");
                return Ok(sha);
            }
        }
        Err(CloneError::ref_not_found(git_ref))
    }

    /// One `ls-remote` call filtered to `pattern`.
    pub async fn lookup(&self, repo_url: &str, pattern: &str) -> Result<RefResolution, CloneError> {
        let spec = git(["ls-remote", repo_url, pattern]).timeout(self.timeout);
        let output = self.runner.run(&spec).await?;
        parse_listing(&output.stdout)
    }
}

/// First whitespace-delimited token of the first non-empty line.
fn parse_listing(stdout: &str) -> Result<RefResolution, CloneError> {
    let Some(line) = stdout.lines().find(|l| !l.trim().is_empty()) else {
        return Ok(RefResolution::NotFound);
    };
    let token = line.split_whitespace().next().unwrap_or_default();
    CommitSha::parse(token)
        .map(RefResolution::CommitId)
        .map_err(|_| CloneError::MalformedListing {
            line: line.to_string(),
        })
}
