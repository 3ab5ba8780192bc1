//! Filesystem blob storage for uploaded ingest files.
//!
//! Objects are addressed by a relative path such as
//! `ingest/{bookmark_id}/{file_name}` and exposed under a public URL prefix.
//! Writes are atomic (temp file + rename) and files are created `0644`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use mindpocket_core::{BlobStore, Error, Result};

/// Filesystem-backed [`BlobStore`].
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FilesystemBlobStore {
    /// Create a store rooted at `base_path` whose objects are served under `public_base_url`.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Create from `BLOB_STORAGE_PATH` and `BLOB_PUBLIC_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("BLOB_STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/mindpocket/blobs".to_string()),
            std::env::var("BLOB_PUBLIC_BASE_URL").unwrap_or_else(|_| "/blobs".to_string()),
        )
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Public URL for an object path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::Storage(format!("Invalid blob path: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Validate that the store can write, read, and delete files.
    ///
    /// Runs a full round trip at startup so permission or mount problems
    /// surface before the first upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join("probe.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"blob-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, path: &str, data: &[u8]) -> Result<String> {
        let full_path = self.full_path(path)?;
        debug!(subsystem = "db", component = "blob_storage", op = "put", blob_path = %path, size = data.len(), "Writing blob");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob_storage: create_dir_all failed");
                Error::Storage(e.to_string())
            })?;
        }

        let mut temp_name = full_path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {}", temp_path.display(), e)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "blob_storage: rename failed");
            Error::Storage(e.to_string())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(self.public_url(path))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", path)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}
