use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name under which the clone workflow is registered with the executor.
pub const WORKFLOW_TYPE: &str = "CloneRepoWorkflow";

/// Every generated workflow id starts with this prefix.
pub const WORKFLOW_ID_PREFIX: &str = "clone-";

/// Length of a full (non-abbreviated) SHA-1 commit id.
pub const COMMIT_SHA_LEN: usize = 40;

/// Input to a clone workflow. Immutable once the workflow starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloneRequest {
    /// Opaque remote locator handed to git.
    pub repo_url: String,
    /// Branch name, tag name, or full commit id.
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl CloneRequest {
    pub fn new(repo_url: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            git_ref: git_ref.into(),
        }
    }
}

// ── Commit ids ──

/// A full 40-character lowercase hex commit id. Never a short hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a full commit id: {0:?}")]
pub struct InvalidSha(pub String);

impl CommitSha {
    /// Parse a full commit id. Uppercase hex is folded to lowercase.
    pub fn parse(raw: &str) -> Result<Self, InvalidSha> {
        let trimmed = raw.trim();
        if !is_full_sha(trimmed) {
            return Err(InvalidSha(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True when `s` is exactly 40 hex digits (either case).
pub fn is_full_sha(s: &str) -> bool {
    s.len() == COMMIT_SHA_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl TryFrom<String> for CommitSha {
    type Error = InvalidSha;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Workflow ids ──

/// Caller-visible correlation token for one clone attempt: `clone-<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed workflow id: {0:?}")]
pub struct InvalidWorkflowId(pub String);

impl WorkflowId {
    /// Assign a fresh id. Called exactly once per clone attempt.
    pub fn generate() -> Self {
        Self(format!("{WORKFLOW_ID_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// Accept an id coming back from a caller.
    ///
    /// Ids double as journal file names, so only `[A-Za-z0-9_-]` is allowed.
    pub fn parse(raw: &str) -> Result<Self, InvalidWorkflowId> {
        let ok = !raw.is_empty()
            && raw.len() <= 128
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidWorkflowId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Results ──

/// Where a snapshot landed on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub path: PathBuf,
}

/// Terminal output of a successful clone workflow.
///
/// `path` stays inside the executor; the public status view only carries `sha`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneResult {
    pub sha: CommitSha,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d";

    #[test]
    fn sha_parses_full_hex() {
        let sha = CommitSha::parse(SHA).unwrap();
        assert_eq!(sha.as_str(), SHA);
    }

    #[test]
    fn sha_folds_uppercase() {
        let sha = CommitSha::parse(&SHA.to_uppercase()).unwrap();
        assert_eq!(sha.as_str(), SHA);
    }

    #[test]
    fn sha_rejects_short_and_non_hex() {
        assert!(CommitSha::parse("7fd1a60").is_err());
        assert!(CommitSha::parse(&format!("{}zz", &SHA[..38])).is_err());
        assert!(CommitSha::parse("").is_err());
    }

    #[test]
    fn sha_deserialize_validates() {
        let ok: Result<CommitSha, _> = serde_json::from_str(&format!("\"{SHA}\""));
        assert!(ok.is_ok());
        let bad: Result<CommitSha, _> = serde_json::from_str("\"abc\"");
        assert!(bad.is_err());
    }

    #[test]
    fn workflow_ids_are_prefixed_and_unique() {
        let a = WorkflowId::generate();
        let b = WorkflowId::generate();
        assert!(a.as_str().starts_with("clone-"));
        assert_ne!(a, b);
        assert!(WorkflowId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn workflow_id_rejects_path_characters() {
        assert!(WorkflowId::parse("../etc/passwd").is_err());
        assert!(WorkflowId::parse("clone-a/b").is_err());
        assert!(WorkflowId::parse("").is_err());
    }

    #[test]
    fn clone_request_uses_wire_names() {
        let req: CloneRequest =
            serde_json::from_str(r#"{"repoUrl":"https://example/repo.git","ref":"main"}"#)
                .unwrap();
        assert_eq!(req, CloneRequest::new("https://example/repo.git", "main"));
    }
}
