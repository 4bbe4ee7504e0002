//! Byte storage for managed assets.
//!
//! Assets are written under `{base}/uploads/{asset-id}/{filename}`, which
//! mirrors the managed URL layout (`/api/files/uploads/{id}/{filename}`).
//! Writes are atomic: bytes land in a temp file that is renamed into place.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use feed_core::defaults::UPLOADS_COLLECTION;
use feed_core::{Error, Result};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Relative storage path for an asset, `uploads/{id}/{filename}`.
pub fn storage_path(id: Uuid, filename: &str) -> String {
    format!("{}/{}/{}", UPLOADS_COLLECTION, id, filename)
}

/// Filesystem storage backend rooted at a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Base directory all paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(Error::Storage(format!("invalid storage path: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Check that the base directory is writable.
    ///
    /// Performs a write/read/delete round trip so misconfigured volumes fail
    /// at startup rather than on the first upload.
    pub async fn validate(&self) -> Result<()> {
        let probe = ".health-check/probe.bin";
        let data = b"storage-health-check";

        self.write(probe, data).await?;
        let read_back = self.read(probe).await?;
        if read_back != data {
            return Err(Error::Storage("read-back mismatch".to_string()));
        }
        self.delete(probe).await?;
        let _ = fs::remove_dir(self.base_path.join(".health-check")).await;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(storage_path = %path, size = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let mut temp_name = full_path.clone().into_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        Ok(fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_layout() {
        let id = Uuid::nil();
        assert_eq!(
            storage_path(id, "cat.png"),
            "uploads/00000000-0000-0000-0000-000000000000/cat.png"
        );
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend.write("uploads/a/b.txt", b"hello").await.unwrap();
        assert_eq!(backend.read("uploads/a/b.txt").await.unwrap(), b"hello");
        assert!(!dir.path().join("uploads/a/b.txt.tmp").exists());

        backend.delete("uploads/a/b.txt").await.unwrap();
        assert!(backend.read("uploads/a/b.txt").await.is_err());
        // Deleting twice is fine
        backend.delete("uploads/a/b.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        for path in ["../outside.txt", "/etc/passwd", "uploads/../../x", ""] {
            let err = backend.write(path, b"x").await.unwrap_err();
            assert!(matches!(err, Error::Storage(_)), "path {:?} accepted", path);
        }
    }

    #[tokio::test]
    async fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.validate().await.unwrap();
        assert!(!dir.path().join(".health-check").exists());
    }
}
