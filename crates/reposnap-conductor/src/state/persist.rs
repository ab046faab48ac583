use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reposnap_core::WorkflowId;

use crate::state::machine::WorkflowState;

const LOCK_FILE: &str = "executor.lock";

/// One JSON journal file per workflow: `{dir}/{workflow_id}.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Workflow ids are restricted to `[A-Za-z0-9_-]`, so they are safe file stems.
    pub fn state_path(&self, id: &WorkflowId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load state from disk. Returns None if the file doesn't exist.
    pub fn load(&self, id: &WorkflowId) -> Result<Option<WorkflowState>> {
        let path = self.state_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_state(&path).map(Some)
    }

    /// Save state atomically (write to temp, then rename).
    pub fn save(&self, state: &WorkflowState) -> Result<()> {
        let path = self.state_path(&state.workflow_id);
        let data = serde_json::to_string_pretty(state)?;
        reposnap_store::write_atomic(&path, data.as_bytes())
            .with_context(|| format!("saving state: {}", path.display()))?;
        Ok(())
    }

    /// Every readable journal in the directory. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<WorkflowState>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing states: {}", self.dir.display()))?;
        let mut states = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_state(&path) {
                Ok(state) => states.push(state),
                Err(e) => tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "skipping unreadable workflow state"),
            }
        }
        states.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(states)
    }
}

fn read_state(path: &Path) -> Result<WorkflowState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading state: {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("parsing state: {}", path.display()))?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposnap_core::CloneRequest;

    fn state(id: &str, started_at: &str) -> WorkflowState {
        WorkflowState::new(
            WorkflowId::parse(id).unwrap(),
            "context-task-queue",
            CloneRequest::new("https://example/repo.git", "main"),
            started_at.into(),
        )
    }

    #[test]
    fn state_path_format() {
        let store = StateStore::new("/var/lib/reposnap");
        let p = store.state_path(&WorkflowId::parse("clone-abc").unwrap());
        assert!(p.ends_with("clone-abc.json"));
        assert!(store.lock_path().ends_with("executor.lock"));
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load(&WorkflowId::parse("clone-x").unwrap()).unwrap().is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested"));
        let mut s = state("clone-a", "2026-01-01T00:00:00Z");
        store.save(&s).unwrap();
        s.version = 42;
        store.save(&s).unwrap();
        let loaded = store.load(&s.workflow_id).unwrap().unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn list_skips_garbage_and_orders_by_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.save(&state("clone-late", "2026-01-02T00:00:00Z")).unwrap();
        store.save(&state("clone-early", "2026-01-01T00:00:00Z")).unwrap();
        std::fs::write(dir.path().join("clone-bad.json"), "{").unwrap();
        std::fs::write(dir.path().join("executor.lock"), "").unwrap();

        let ids: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.workflow_id.to_string())
            .collect();
        assert_eq!(ids, vec!["clone-early", "clone-late"]);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StateStore::new(dir.path().join("nope")).list().unwrap().is_empty());
    }
}
