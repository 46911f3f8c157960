//! Upman Storage Library
//!
//! This crate provides the [`Storage`] trait (save, bulk save, delete, bulk delete, find)
//! and its implementations for S3-compatible object stores and the local filesystem.
//!
//! # Storage key format
//!
//! Every backend is bound to a [`StorageLocation`]: a bucket (or base directory) and a
//! key prefix. A caller-supplied path becomes the key
//! `normalize_path("{prefix}/{path}")`, which never starts with `/` and never contains
//! empty, `.` or `..` segments. Key generation lives in the `keys` module so all
//! backends stay consistent.
//!
//! # Finding files
//!
//! [`Storage::find`] filters a namespace with Finder-style masks, compiled by the
//! [`pattern`] module.

pub mod client;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod pattern;
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-s3")]
pub use client::AwsS3Client;
pub use client::ObjectStoreClient;
pub use factory::create_storage;
pub use keys::{normalize_path, StorageLocation};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use pattern::MatchPattern;
pub use s3::S3Storage;
pub use traits::{FileRef, FoundObjects, Storage, StorageError, StorageResult, UploadJob};
pub use upman_core::StorageBackend;
