//! Per-job scratch directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the engine's scratch space inside a work directory
pub const CACHE_DIR: &str = "cache";

/// A uniquely named directory removed when dropped
///
/// Layout: `patched.{ext}`, `aligned.{ext}`, `out.{ext}` and `cache/`.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    extension: String,
}

impl WorkDir {
    /// Create a fresh directory under `root`
    pub fn create(root: &Path, extension: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("job-").tempdir_in(root)?;
        fs::create_dir(dir.path().join(CACHE_DIR))?;
        log::debug!("Created work directory {}", dir.path().display());
        Ok(Self {
            dir,
            extension: extension.to_string(),
        })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Engine scratch space
    pub fn cache_dir(&self) -> PathBuf {
        self.path().join(CACHE_DIR)
    }

    /// Merged archive
    pub fn patched(&self) -> PathBuf {
        self.file("patched")
    }

    /// Aligned archive
    pub fn aligned(&self) -> PathBuf {
        self.file("aligned")
    }

    /// Signed archive
    pub fn signed(&self) -> PathBuf {
        self.file("out")
    }

    /// Delete the directory, reporting failures
    pub fn close(self) -> io::Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close()?;
        log::debug!("Removed work directory {}", path.display());
        Ok(())
    }

    fn file(&self, stem: &str) -> PathBuf {
        self.path().join(format!("{}.{}", stem, self.extension))
    }
}
