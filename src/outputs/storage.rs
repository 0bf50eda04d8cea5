//! Destinations for finished files.
//!
//! Only the local filesystem backend lives here. Anything remote (Drive,
//! buckets) plugs in through the same [`Storage`] trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::StorageError;
use crate::outputs::file::OriginFile;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `file` under `folder`, returning where it ended up.
    async fn upload_file(&self, file: &OriginFile, folder: &str) -> Result<String, StorageError>;

    async fn create_folder(&self, folder: &str, parent: &str) -> Result<String, StorageError>;
}

/// Writes files beneath a root directory.
///
/// A file whose name is already taken is written as `copy-{name}` instead of
/// overwriting the earlier run.
#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First of `name`, `copy-name`, `copy-copy-name`, ... not yet taken in `dir`.
    async fn free_path(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
        let mut candidate = dir.join(name);
        while fs::try_exists(&candidate).await.map_err(io_err(&candidate))? {
            let taken = candidate
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string());
            candidate = dir.join(format!("copy-{taken}"));
        }
        Ok(candidate)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Storage for FileSystem {
    #[instrument(level = "info", skip_all, fields(file = %file.name(), origin = %file.origin(), %folder))]
    async fn upload_file(&self, file: &OriginFile, folder: &str) -> Result<String, StorageError> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let path = Self::free_path(&dir, file.name()).await?;
        fs::write(&path, file.data()).await.map_err(io_err(&path))?;

        info!(path = %path.display(), bytes = file.data().len(), "Wrote file");
        Ok(path.display().to_string())
    }

    async fn create_folder(&self, folder: &str, parent: &str) -> Result<String, StorageError> {
        let dir = self.root.join(parent).join(folder);
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;
        Ok(dir.display().to_string())
    }
}
