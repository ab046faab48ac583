use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Return the per-user store root.
/// Linux: `$XDG_DATA_HOME/reposnap`, falling back to `~/.reposnap/`.
pub fn store_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("reposnap")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".reposnap")
    } else {
        PathBuf::from(".reposnap-store")
    }
}

/// Default directory for workflow journals: `store_root/workflows/`
pub fn default_state_dir() -> PathBuf {
    store_root().join("workflows")
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    _file: fs::File,
}

fn open_lock(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?)
}

/// Acquire an exclusive file lock without waiting.
/// Fails if another handle (in this or another process) holds it.
pub fn try_lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    let file = open_lock(path)?;
    file.try_lock_exclusive()
        .map_err(|e| anyhow::anyhow!("{} is locked: {e}", path.display()))?;
    Ok(LockGuard { _file: file })
}
