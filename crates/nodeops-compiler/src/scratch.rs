//! Scoped temporary files
//!
//! Certificates issued for a node and boot scripts are written to temporary
//! locations the executor reads. A [`ScratchSpace`] owns all of them and
//! removes them when dropped, on success and error paths alike.

use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{Builder, TempDir, TempPath};

#[derive(Default)]
pub struct ScratchSpace {
    dirs: Vec<TempDir>,
    files: Vec<TempPath>,
}

impl ScratchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory whose name starts with `prefix`
    pub fn create_dir(&mut self, prefix: &str) -> Result<PathBuf> {
        let dir = Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().to_path_buf();
        self.dirs.push(dir);
        Ok(path)
    }

    /// Create a file holding `contents`
    pub fn create_file(&mut self, prefix: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf> {
        let mut file = Builder::new().prefix(prefix).suffix(suffix).tempfile()?;
        file.write_all(contents)?;
        file.flush()?;
        let path = file.into_temp_path();
        let owned = path.to_path_buf();
        self.files.push(path);
        Ok(owned)
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        for file in self.files.drain(..) {
            let path = file.to_path_buf();
            if let Err(e) = file.close() {
                tracing::error!("Failed to remove {}: {}", path.display(), e);
            }
        }
        for dir in self.dirs.drain(..) {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::error!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
