use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::{CheckpointError, CheckpointStore, Result};

/// Checkpoint kept as decimal text in a file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// checkpoint, so a crash never leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io { path: self.path.clone(), source }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_err(err)),
        };

        let value = content.trim();
        value
            .parse()
            .map(Some)
            .map_err(|_| CheckpointError::Malformed { location: self.location(), value: value.to_string() })
    }

    async fn store(&self, block_n: u64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_err(e))?;
        }

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await.map_err(|e| self.io_err(e))?;
        file.write_all(block_n.to_string().as_bytes()).await.map_err(|e| self.io_err(e))?;
        file.sync_all().await.map_err(|e| self.io_err(e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_err(e))
    }

    fn location(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
