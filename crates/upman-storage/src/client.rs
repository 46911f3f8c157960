//! Object store client contract
//!
//! [`S3Storage`](crate::S3Storage) talks to the remote store only through
//! [`ObjectStoreClient`]. The client is expected to be configured and authenticated
//! before it is handed to the backend; [`AwsS3Client`] is the production implementation.

use crate::traits::StorageResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::PathBuf;

/// Canned visibility applied to uploaded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    PublicRead,
}

/// Durability tier for uploaded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    ReducedRedundancy,
}

/// Upload of one local file to one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub source_path: PathBuf,
    pub acl: ObjectAcl,
    pub storage_class: StorageClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Public URL of the stored object
    pub object_url: String,
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
}

/// Operations the storage backend needs from an object store.
///
/// Implementations must be safe for concurrent use; the backend issues several
/// `put_object` calls at once during bulk uploads.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> StorageResult<PutObjectOutput>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete every key in a single request
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StorageResult<()>;

    /// Every object whose key starts with `prefix`. Pages are fetched lazily as the
    /// stream is polled.
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, StorageResult<ListedObject>>;

    /// Public URL of `key` in `bucket`. No network access.
    fn object_url(&self, bucket: &str, key: &str) -> String;
}

#[cfg(feature = "storage-s3")]
pub use aws::AwsS3Client;

#[cfg(feature = "storage-s3")]
mod aws {
    use super::*;
    use crate::traits::StorageError;
    use aws_config::meta::region::RegionProviderChain;
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
    use aws_sdk_s3::Client;
    use futures::{StreamExt, TryStreamExt};

    impl From<ObjectAcl> for ObjectCannedAcl {
        fn from(acl: ObjectAcl) -> Self {
            match acl {
                ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
            }
        }
    }

    impl From<StorageClass> for aws_sdk_s3::types::StorageClass {
        fn from(class: StorageClass) -> Self {
            match class {
                StorageClass::ReducedRedundancy => {
                    aws_sdk_s3::types::StorageClass::ReducedRedundancy
                }
            }
        }
    }

    /// [`ObjectStoreClient`] backed by the AWS SDK
    #[derive(Clone)]
    pub struct AwsS3Client {
        client: Client,
        region: String,
        endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    }

    impl AwsS3Client {
        /// Wrap an already configured SDK client.
        ///
        /// `region` and `endpoint_url` are only used to build public object URLs.
        pub fn from_client(client: Client, region: String, endpoint_url: Option<String>) -> Self {
            AwsS3Client {
                client,
                region,
                endpoint_url,
            }
        }

        /// Build a client from the default AWS credential chain
        ///
        /// # Arguments
        /// * `region` - AWS region (or region identifier for S3-compatible providers)
        /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
        ///   (e.g., "http://localhost:9000" for MinIO)
        pub async fn from_env_config(region: String, endpoint_url: Option<String>) -> Self {
            let region_provider =
                RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

            let config = aws_config::defaults(BehaviorVersion::latest())
                .region(region_provider)
                .load()
                .await;

            let client = match endpoint_url {
                Some(ref endpoint) => {
                    // Path-style addressing is required by MinIO and most S3-compatible providers
                    let s3_config = aws_sdk_s3::config::Builder::from(&config)
                        .endpoint_url(endpoint)
                        .force_path_style(true)
                        .build();
                    Client::from_conf(s3_config)
                }
                None => Client::new(&config),
            };

            Self::from_client(client, region, endpoint_url)
        }

        async fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            continuation_token: Option<String>,
        ) -> StorageResult<(Vec<ListedObject>, Option<String>)> {
            let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(DisplayErrorContext(&e).to_string()))?;

            let objects = resp
                .contents()
                .iter()
                .filter_map(|obj| {
                    obj.key().map(|key| ListedObject {
                        key: key.to_string(),
                    })
                })
                .collect();

            let next = if resp.is_truncated().unwrap_or(false) {
                resp.next_continuation_token().map(String::from)
            } else {
                None
            };

            Ok((objects, next))
        }
    }

    #[async_trait]
    impl ObjectStoreClient for AwsS3Client {
        async fn put_object(&self, request: PutObjectRequest) -> StorageResult<PutObjectOutput> {
            if !tokio::fs::try_exists(&request.source_path).await? {
                return Err(StorageError::NotFound(
                    request.source_path.display().to_string(),
                ));
            }

            let body = ByteStream::from_path(&request.source_path)
                .await
                .map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to read {}: {}",
                        request.source_path.display(),
                        e
                    ))
                })?;

            self.client
                .put_object()
                .bucket(&request.bucket)
                .key(&request.key)
                .body(body)
                .acl(request.acl.into())
                .storage_class(request.storage_class.into())
                .send()
                .await
                .map_err(|e| StorageError::UploadFailed(DisplayErrorContext(&e).to_string()))?;

            Ok(PutObjectOutput {
                object_url: self.object_url(&request.bucket, &request.key),
            })
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| StorageError::DeleteFailed(DisplayErrorContext(&e).to_string()))?;
            Ok(())
        }

        async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
            let objects = keys
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::BackendError(e.to_string()))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::BackendError(e.to_string()))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| StorageError::DeleteFailed(DisplayErrorContext(&e).to_string()))?;

            // Quiet mode: only failed keys come back
            let errors = output.errors();
            if !errors.is_empty() {
                tracing::warn!(
                    bucket = %bucket,
                    requested = keys.len(),
                    failed = errors.len(),
                    first_failed_key = errors.first().and_then(|e| e.key()).unwrap_or_default(),
                    "S3 bulk delete reported per-object failures"
                );
            }

            Ok(())
        }

        fn list_objects<'a>(
            &'a self,
            bucket: &'a str,
            prefix: &'a str,
        ) -> BoxStream<'a, StorageResult<ListedObject>> {
            // State: None once the last page has been read, Some(token) otherwise
            let pages = futures::stream::try_unfold(
                Some(None::<String>),
                move |state| async move {
                    let Some(token) = state else {
                        return Ok::<_, StorageError>(None);
                    };
                    let (objects, next) = self.list_page(bucket, prefix, token).await?;
                    Ok(Some((objects, next.map(Some))))
                },
            );

            pages
                .map_ok(|objects| futures::stream::iter(objects.into_iter().map(Ok::<_, StorageError>)))
                .try_flatten()
                .boxed()
        }

        /// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
        /// For S3-compatible providers, path-style: `{endpoint}/{bucket}/{key}`.
        fn object_url(&self, bucket: &str, key: &str) -> String {
            let key = key
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/");

            match self.endpoint_url {
                Some(ref endpoint) => {
                    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
                }
                None => format!(
                    "https://{}.s3.{}.amazonaws.com/{}",
                    bucket, self.region, key
                ),
            }
        }
    }

}
