//! Local staging copies of fetched files.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Directory where fetched bytes are written before upload.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a staging file named after `file_name`.
    pub async fn stage(&self, file_name: &str, data: &[u8]) -> std::io::Result<StagedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name.replace(['/', '\\'], "_"));
        tokio::fs::write(&path, data).await?;
        Ok(StagedFile { path })
    }
}

/// A staged file that the caller removes once it is stored.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staging copy. Failures are logged; the stored object is
    /// already durable.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove staging file");
        }
    }
}
