// Storage Module
// Narrow filesystem interface used for downloads, offline checks and working directories

pub mod local;

pub use local::LocalFileSystem;

use crate::error::PipelineResult;

/// Filesystem operations the engine needs from a storage backend
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a whole file
    async fn read(&self, path: &str) -> PipelineResult<Vec<u8>>;

    /// Create or replace a file
    async fn write(&self, path: &str, data: &[u8]) -> PipelineResult<()>;

    async fn exists(&self, path: &str) -> bool;

    async fn is_dir(&self, path: &str) -> bool;

    /// Create a directory and any missing parents
    async fn make_dir(&self, path: &str) -> PipelineResult<()>;

    /// Path as it should be reported to later stages
    fn resolve(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Create `folder` if needed and return its resolved location
pub async fn make_temp_folder(fs: &dyn FileSystem, folder: &str) -> PipelineResult<String> {
    if !fs.is_dir(folder).await {
        fs.make_dir(folder).await?;
    }
    Ok(fs.resolve(folder))
}

/// Whether a product already exists; `.zarr` stores are directories
pub async fn is_file_present(fs: &dyn FileSystem, path: &str) -> bool {
    if path.trim_end_matches('/').ends_with(".zarr") {
        fs.is_dir(path).await
    } else {
        fs.exists(path).await && !fs.is_dir(path).await
    }
}

/// Join a base location and a relative segment with a single `/`
pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        return segment.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
