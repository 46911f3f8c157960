//! Configuration module
//!
//! Storage configuration is read from the environment (a `.env` file is loaded first when
//! present). Every backend shares `STORAGE_PREFIX`; the remaining keys are backend-specific.

use std::env;

use crate::storage_types::StorageBackend;

/// Storage configuration shared by the factory and the CLI
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub storage_backend: StorageBackend,
    /// Key prefix inside the bucket (or base directory) that every path is joined to
    pub storage_prefix: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_backend = match get("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let config = StorageConfig {
            storage_backend,
            storage_prefix: get("STORAGE_PREFIX").unwrap_or_default(),
            s3_bucket: get("S3_BUCKET"),
            s3_region: get("S3_REGION"),
            s3_endpoint: get("S3_ENDPOINT"),
            aws_region: get("AWS_REGION"),
            local_storage_path: get("LOCAL_STORAGE_PATH"),
            local_storage_base_url: get("LOCAL_STORAGE_BASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when STORAGE_BACKEND is s3"
                    ));
                }
                if self.region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND is s3"
                    ));
                }
                if let Some(endpoint) = &self.s3_endpoint {
                    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                        return Err(anyhow::anyhow!(
                            "S3_ENDPOINT must start with http:// or https://"
                        ));
                    }
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND is local"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when STORAGE_BACKEND is local"
                    ));
                }
            }
        }
        Ok(())
    }

    /// S3 region, falling back to `AWS_REGION`
    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}
