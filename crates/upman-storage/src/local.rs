use crate::keys::StorageLocation;
use crate::pattern;
use crate::traits::{FileRef, FoundObjects, Storage, StorageError, StorageResult, UploadJob};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
///
/// Keys map to files under `base_path`; the same key layout as the S3 backend is used,
/// so a directory served at `base_url` mirrors a bucket.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    location: StorageLocation,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/upman/files")
    /// * `relative_path` - Key prefix inside the root directory
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/files")
    pub async fn new(
        base_path: impl Into<PathBuf>,
        relative_path: &str,
        base_url: String,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let location = StorageLocation::new(base_path.to_string_lossy(), relative_path);

        Ok(LocalStorage {
            base_path,
            location,
            base_url,
        })
    }

    /// Convert a normalized key to a filesystem path.
    ///
    /// Normalized keys cannot contain `..`, but a symlink on the way may still point
    /// outside the base directory. The deepest part of the path that already exists
    /// must resolve inside `base_path`, so nothing is created through such a link.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        let path = self.base_path.join(key);
        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        for existing in path.ancestors() {
            // Not created yet
            if existing.symlink_metadata().is_err() {
                continue;
            }
            // Dangling links fail to canonicalize and are rejected too
            let inside = existing
                .canonicalize()
                .map(|canonical| canonical.starts_with(&base_canonical))
                .unwrap_or(false);
            if !inside {
                return Err(StorageError::InvalidKey(format!(
                    "{} resolves outside storage directory",
                    key
                )));
            }
            break;
        }

        Ok(path)
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn copy_in(&self, source: &Path, destination: &str) -> StorageResult<String> {
        let key = self.location.object_key(destination)?;
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(StorageError::NotFound(source.display().to_string()));
        }

        self.ensure_parent_dir(&path).await?;

        let size = fs::copy(source, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(self.generate_url(&key))
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        let key = self.location.object_key(path)?;
        let path = self.key_to_path(&key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), key = %key, "Local storage file removed");

        Ok(())
    }

    /// Every file key under `base_path` starting with `prefix`
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Only the directory holding the prefix's last segment can contain matches
        let root = match prefix.rfind('/') {
            Some(idx) => self.base_path.join(&prefix[..idx]),
            None => self.base_path.clone(),
        };

        // A prefix running through a regular file lists nothing
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut keys = Vec::new();
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.base_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, source: &Path, destination: &str) -> StorageResult<String> {
        self.copy_in(source, destination).await
    }

    async fn bulk_save(&self, jobs: &[UploadJob]) -> StorageResult<Vec<String>> {
        try_join_all(
            jobs.iter()
                .map(|job| self.copy_in(&job.source, &job.destination)),
        )
        .await
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        self.remove(path).await?;

        tracing::info!(
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn bulk_delete(&self, paths: &[&str]) -> StorageResult<()> {
        let start = std::time::Instant::now();
        try_join_all(paths.iter().map(|path| self.remove(path))).await?;

        tracing::info!(
            count = paths.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage bulk delete successful"
        );

        Ok(())
    }

    async fn find(&self, namespace: &str, masks: &[&str]) -> StorageResult<FoundObjects> {
        let pattern = pattern::compile(masks)?;
        let prefix = self.location.key(namespace)?;

        let results: FoundObjects = self
            .list_keys(&prefix)
            .await?
            .into_iter()
            .filter(|key| pattern::key_matches(pattern.as_ref(), key))
            .map(|key| {
                let url = self.generate_url(&key);
                (url.clone(), FileRef::from_url(url))
            })
            .collect();

        Ok(results)
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
