//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys::StorageLocation;
use crate::StorageBackend;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid mask pattern: {0}")]
    InvalidPattern(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A single file to upload: local source and destination relative to the storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub source: PathBuf,
    pub destination: String,
}

impl UploadJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        UploadJob {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Lightweight reference to a stored file. Carries no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    /// Public URL of the file
    pub path: String,
    /// Last path segment of the URL
    pub name: String,
}

impl FileRef {
    pub fn from_url(url: impl Into<String>) -> Self {
        let path = url.into();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        FileRef { path, name }
    }
}

/// Objects returned by [`Storage::find`], keyed by public URL
pub type FoundObjects = BTreeMap<String, FileRef>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait. Paths passed to
/// the trait are relative to the backend's [`StorageLocation`]; every backend joins them
/// with [`StorageLocation::key`] so the resulting keys are identical across backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload one file and return its public URL
    async fn save(&self, source: &std::path::Path, destination: &str) -> StorageResult<String>;

    /// Upload every job concurrently and wait for all of them.
    ///
    /// URLs are returned in the order of `jobs`. If any upload fails the whole call fails
    /// and no URLs are returned.
    async fn bulk_save(&self, jobs: &[UploadJob]) -> StorageResult<Vec<String>>;

    /// Delete one file
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Delete several files in one batch
    async fn bulk_delete(&self, paths: &[&str]) -> StorageResult<()>;

    /// List the files under `namespace` whose key matches one of `masks`.
    ///
    /// Masks use Finder-style globs (`*`, `**`, `?`, `[...]`); see [`crate::pattern`].
    /// An empty mask list, or a bare `*`, keeps every file.
    async fn find(&self, namespace: &str, masks: &[&str]) -> StorageResult<FoundObjects>;

    /// Bucket (or base directory) and key prefix this backend writes under
    fn location(&self) -> &StorageLocation;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
