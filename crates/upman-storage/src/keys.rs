//! Storage locations and key normalization.
//!
//! Every key is built as `normalize_path("{relative_path}/{path}")`, so keys never start
//! with `/`, never contain empty segments, and never contain `.` or `..`. Caller paths
//! whose `..` segments would leave the prefix are rejected.

use crate::traits::{StorageError, StorageResult};

/// Normalize a `/`-separated path.
///
/// Backslashes are treated as separators, redundant separators and `.` segments are
/// dropped, and `..` removes the preceding segment. A `..` with nothing left to remove is
/// discarded, so the result can never climb above the root.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Where a backend stores its objects: a bucket (or base directory) plus a key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    base_path: String,
    relative_path: String,
}

impl StorageLocation {
    pub fn new(base_path: impl AsRef<str>, relative_path: impl AsRef<str>) -> Self {
        StorageLocation {
            base_path: base_path.as_ref().trim_end_matches('/').to_string(),
            relative_path: relative_path.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Bucket name or base directory, without trailing slash
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Key prefix, without leading or trailing slash
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Full key for `path`. May be empty when both parts normalize away.
    ///
    /// `..` segments resolve inside `path`; one that would climb out of the prefix is
    /// rejected with [`StorageError::InvalidKey`].
    pub fn key(&self, path: &str) -> StorageResult<String> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(StorageError::InvalidKey(format!(
                            "path {:?} escapes the storage prefix",
                            path
                        )));
                    }
                }
                other => segments.push(other),
            }
        }
        Ok(normalize_path(&format!(
            "{}/{}",
            self.relative_path,
            segments.join("/")
        )))
    }

    /// Full key for a single object; an empty key is rejected.
    pub fn object_key(&self, path: &str) -> StorageResult<String> {
        let key = self.key(path)?;
        if key.is_empty() {
            return Err(StorageError::InvalidKey(format!(
                "path {:?} does not name an object",
                path
            )));
        }
        Ok(key)
    }
}
