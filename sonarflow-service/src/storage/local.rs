use crate::error::{PipelineError, PipelineResult};
use crate::storage::FileSystem;

use std::path::{Path, PathBuf};

/// Filesystem backed by the local disk; accepts plain paths and `file://` URLs
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn local(path: &str) -> PathBuf {
        PathBuf::from(path.strip_prefix("file://").unwrap_or(path))
    }
}

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &str) -> PipelineResult<Vec<u8>> {
        tokio::fs::read(Self::local(path))
            .await
            .map_err(|e| PipelineError::storage(path, e))
    }

    async fn write(&self, path: &str, data: &[u8]) -> PipelineResult<()> {
        let target = Self::local(path);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::storage(path, e))?;
        }
        tokio::fs::write(&target, data)
            .await
            .map_err(|e| PipelineError::storage(path, e))
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(Self::local(path))
            .await
            .unwrap_or(false)
    }

    async fn is_dir(&self, path: &str) -> bool {
        tokio::fs::metadata(Self::local(path))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn make_dir(&self, path: &str) -> PipelineResult<()> {
        tokio::fs::create_dir_all(Self::local(path))
            .await
            .map_err(|e| PipelineError::storage(path, e))
    }

    fn resolve(&self, path: &str) -> String {
        let local = Self::local(path);
        Path::new(&local)
            .canonicalize()
            .unwrap_or(local)
            .to_string_lossy()
            .to_string()
    }
}
