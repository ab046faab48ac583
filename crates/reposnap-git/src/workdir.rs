use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hands out fresh, empty, uniquely named directories under a root.
///
/// Uniqueness comes from `tempfile`'s random suffix plus exclusive `mkdir`,
/// so concurrent callers never collide and need no locking. Directories
/// outlive the allocator; cleanup is the caller's business.
#[derive(Debug, Clone)]
pub struct WorkdirAllocator {
    root: PathBuf,
}

impl Default for WorkdirAllocator {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl WorkdirAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `<root>/<prefix>-XXXXXX` and return its absolute path.
    pub fn allocate(&self, prefix: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .tempdir_in(&self.root)?;
        std::path::absolute(dir.keep())
    }
}
