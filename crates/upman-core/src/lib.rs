//! Upman Core Library
//!
//! Configuration and shared types used by the storage backends and the CLI.

pub mod config;
pub mod storage_types;

// Re-export commonly used types
pub use config::StorageConfig;
pub use storage_types::StorageBackend;
