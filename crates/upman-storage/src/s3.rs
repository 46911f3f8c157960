use crate::client::{ObjectAcl, ObjectStoreClient, PutObjectRequest, StorageClass};
use crate::keys::StorageLocation;
use crate::pattern::{self, MatchPattern};
use crate::traits::{FileRef, FoundObjects, Storage, StorageResult, UploadJob};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::future::try_join_all;
use futures::TryStreamExt;
use std::path::Path;
use std::sync::Arc;

/// S3 storage implementation
///
/// Objects are uploaded public-read with the reduced-redundancy storage class. Callers
/// that need standard durability must not use this backend for their only copy.
#[derive(Clone)]
pub struct S3Storage {
    client: Arc<dyn ObjectStoreClient>,
    location: StorageLocation,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `location` - Bucket name and key prefix
    /// * `client` - Configured, authenticated object store client
    pub fn new(location: StorageLocation, client: Arc<dyn ObjectStoreClient>) -> Self {
        S3Storage { client, location }
    }

    fn bucket(&self) -> &str {
        self.location.base_path()
    }

    async fn upload(&self, source: &Path, destination: &str) -> StorageResult<String> {
        let key = self.location.object_key(destination)?;
        let start = std::time::Instant::now();

        let request = PutObjectRequest {
            bucket: self.bucket().to_string(),
            key: key.clone(),
            source_path: source.to_path_buf(),
            acl: ObjectAcl::PublicRead,
            storage_class: StorageClass::ReducedRedundancy,
        };

        let output = self.client.put_object(request).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket(),
                key = %key,
                source = %source.display(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(output.object_url)
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save(&self, source: &Path, destination: &str) -> StorageResult<String> {
        self.upload(source, destination).await
    }

    async fn bulk_save(&self, jobs: &[UploadJob]) -> StorageResult<Vec<String>> {
        let start = std::time::Instant::now();

        // Output order follows `jobs`; the first error drops the uploads still in flight.
        let urls = try_join_all(
            jobs.iter()
                .map(|job| self.upload(&job.source, &job.destination)),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket(),
                count = jobs.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 bulk upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket(),
            count = jobs.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bulk upload successful"
        );

        Ok(urls)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let key = self.location.object_key(path)?;
        let start = std::time::Instant::now();

        self.client
            .delete_object(self.bucket(), &key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket(),
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn bulk_delete(&self, paths: &[&str]) -> StorageResult<()> {
        // S3 rejects a bulk delete naming no objects
        if paths.is_empty() {
            return Ok(());
        }

        let keys = paths
            .iter()
            .map(|path| self.location.object_key(path))
            .collect::<StorageResult<Vec<_>>>()?;
        let start = std::time::Instant::now();

        self.client
            .delete_objects(self.bucket(), &keys)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket(),
                    count = keys.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 bulk delete failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket(),
            count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bulk delete successful"
        );

        Ok(())
    }

    async fn find(&self, namespace: &str, masks: &[&str]) -> StorageResult<FoundObjects> {
        let pattern = pattern::compile(masks)?;
        let prefix = self.location.key(namespace)?;
        let start = std::time::Instant::now();

        let mut objects = self.client.list_objects(self.bucket(), &prefix);
        let mut results = FoundObjects::new();
        let mut listed = 0usize;

        while let Some(object) = objects.try_next().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket(),
                prefix = %prefix,
                "S3 listing failed"
            );
            e
        })? {
            listed += 1;
            if pattern::key_matches(pattern.as_ref(), &object.key) {
                let url = self.client.object_url(self.bucket(), &object.key);
                results.insert(url.clone(), FileRef::from_url(url));
            }
        }

        tracing::debug!(
            bucket = %self.bucket(),
            prefix = %prefix,
            pattern = pattern.as_ref().map(MatchPattern::as_str).unwrap_or("*"),
            listed,
            matched = results.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 find completed"
        );

        Ok(results)
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ListedObject, PutObjectOutput};
    use crate::traits::StorageError;
    use futures::stream::BoxStream;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Put(PutObjectRequest),
        Delete(String),
        DeleteMany(Vec<String>),
        List(String),
    }

    /// In-memory client: keys are listed in `page_size` pages, uploads can be delayed
    /// or made to fail per key.
    #[derive(Default)]
    struct MemoryClient {
        keys: Vec<String>,
        page_size: usize,
        delays: HashMap<String, Duration>,
        failing: Vec<String>,
        calls: Mutex<Vec<Call>>,
        completed: Mutex<Vec<String>>,
    }

    impl MemoryClient {
        fn with_keys(keys: &[&str], page_size: usize) -> Self {
            MemoryClient {
                keys: keys.iter().map(|k| k.to_string()).collect(),
                page_size,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStoreClient for MemoryClient {
        async fn put_object(&self, request: PutObjectRequest) -> StorageResult<PutObjectOutput> {
            self.calls.lock().unwrap().push(Call::Put(request.clone()));
            if let Some(delay) = self.delays.get(&request.key) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(&request.key) {
                return Err(StorageError::UploadFailed(format!(
                    "AccessDenied: {}",
                    request.key
                )));
            }
            self.completed.lock().unwrap().push(request.key.clone());
            Ok(PutObjectOutput {
                object_url: self.object_url(&request.bucket, &request.key),
            })
        }

        async fn delete_object(&self, _bucket: &str, key: &str) -> StorageResult<()> {
            self.calls.lock().unwrap().push(Call::Delete(key.to_string()));
            Ok(())
        }

        async fn delete_objects(&self, _bucket: &str, keys: &[String]) -> StorageResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::DeleteMany(keys.to_vec()));
            Ok(())
        }

        fn list_objects<'a>(
            &'a self,
            _bucket: &'a str,
            prefix: &'a str,
        ) -> BoxStream<'a, StorageResult<ListedObject>> {
            let matching: Vec<String> = self
                .keys
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            let pages: Vec<Vec<String>> = matching
                .chunks(self.page_size.max(1))
                .map(|c| c.to_vec())
                .collect();
            let calls = &self.calls;

            futures::stream::iter(pages)
                .then(move |page| async move {
                    calls.lock().unwrap().push(Call::List(prefix.to_string()));
                    page
                })
                .flat_map(|page| {
                    futures::stream::iter(
                        page.into_iter()
                            .map(|key| Ok(ListedObject { key })),
                    )
                })
                .boxed()
        }

        fn object_url(&self, bucket: &str, key: &str) -> String {
            format!("https://{}.example.com/{}", bucket, key)
        }
    }

    fn storage(client: Arc<MemoryClient>) -> S3Storage {
        S3Storage::new(StorageLocation::new("uploads/", "/media/"), client)
    }

    #[tokio::test]
    async fn save_uploads_public_reduced_redundancy_object() {
        let client = Arc::new(MemoryClient::default());
        let storage = storage(client.clone());

        let url = storage
            .save(Path::new("/tmp/photo.jpg"), "/avatars//photo.jpg")
            .await
            .unwrap();

        assert_eq!(url, "https://uploads.example.com/media/avatars/photo.jpg");
        assert_eq!(
            client.calls(),
            vec![Call::Put(PutObjectRequest {
                bucket: "uploads".to_string(),
                key: "media/avatars/photo.jpg".to_string(),
                source_path: "/tmp/photo.jpg".into(),
                acl: ObjectAcl::PublicRead,
                storage_class: StorageClass::ReducedRedundancy,
            })]
        );
    }

    #[tokio::test]
    async fn save_surfaces_transport_error() {
        let client = Arc::new(MemoryClient {
            failing: vec!["media/a.png".to_string()],
            ..Default::default()
        });
        let storage = storage(client);

        let result = storage.save(Path::new("a.png"), "a.png").await;
        assert!(matches!(result, Err(StorageError::UploadFailed(msg)) if msg.contains("AccessDenied")));
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_save_keeps_input_order() {
        let client = Arc::new(MemoryClient {
            delays: HashMap::from([
                ("media/x.png".to_string(), Duration::from_millis(50)),
                ("media/y.png".to_string(), Duration::from_millis(5)),
            ]),
            ..Default::default()
        });
        let storage = storage(client.clone());

        let urls = storage
            .bulk_save(&[UploadJob::new("a.png", "x.png"), UploadJob::new("b.png", "y.png")])
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://uploads.example.com/media/x.png",
                "https://uploads.example.com/media/y.png",
            ]
        );
        // y finished first, so the uploads really ran concurrently
        assert_eq!(
            *client.completed.lock().unwrap(),
            vec!["media/y.png".to_string(), "media/x.png".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_save_fails_as_a_whole() {
        let client = Arc::new(MemoryClient {
            failing: vec!["media/y.png".to_string()],
            ..Default::default()
        });
        let storage = storage(client);

        let result = storage
            .bulk_save(&[UploadJob::new("a.png", "x.png"), UploadJob::new("b.png", "y.png")])
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn bulk_save_of_nothing_is_empty() {
        let storage = storage(Arc::new(MemoryClient::default()));
        assert!(storage.bulk_save(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_uses_normalized_key() {
        let client = Arc::new(MemoryClient::default());
        let storage = storage(client.clone());

        storage.delete("./a/../b.png").await.unwrap();

        assert_eq!(client.calls(), vec![Call::Delete("media/b.png".to_string())]);
    }

    #[tokio::test]
    async fn delete_rejects_empty_key() {
        let storage = S3Storage::new(
            StorageLocation::new("uploads", ""),
            Arc::new(MemoryClient::default()),
        );
        assert!(matches!(
            storage.delete("/").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn paths_leaving_the_prefix_are_rejected() {
        let client = Arc::new(MemoryClient::with_keys(&["media/a.png", "private/b.png"], 10));
        let storage = storage(client.clone());

        assert!(matches!(
            storage.delete("../private/b.png").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.bulk_delete(&["a.png", "x/../../private/b.png"]).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.find("..", &[]).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.save(Path::new("a.png"), "../a.png").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn bulk_delete_is_one_request() {
        let client = Arc::new(MemoryClient::default());
        let storage = storage(client.clone());

        storage.bulk_delete(&["a.png", "/b.png", "c//d.png"]).await.unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::DeleteMany(vec![
                "media/a.png".to_string(),
                "media/b.png".to_string(),
                "media/c/d.png".to_string(),
            ])]
        );
    }

    #[tokio::test]
    async fn bulk_delete_of_nothing_makes_no_request() {
        let client = Arc::new(MemoryClient::default());
        let storage = storage(client.clone());

        storage.bulk_delete(&[]).await.unwrap();

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn find_filters_by_prefix_and_mask() {
        let client = Arc::new(MemoryClient::with_keys(
            &["ns/a.jpg", "ns/b.png", "other/c.jpg"],
            100,
        ));
        let storage = S3Storage::new(StorageLocation::new("uploads", ""), client);

        let found = storage.find("ns", &["*.jpg"]).await.unwrap();

        assert_eq!(found.len(), 1);
        let file = &found["https://uploads.example.com/ns/a.jpg"];
        assert_eq!(file.name, "a.jpg");
    }

    #[tokio::test]
    async fn find_reads_every_page() {
        let keys: Vec<String> = (0..7).map(|i| format!("media/ns/{}.jpg", i)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let client = Arc::new(MemoryClient::with_keys(&keys, 3));
        let storage = storage(client.clone());

        let found = storage.find("/ns/", &[]).await.unwrap();

        assert_eq!(found.len(), 7);
        let list_calls = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::List(p) if p == "media/ns"))
            .count();
        assert_eq!(list_calls, 3);
    }

    #[tokio::test]
    async fn find_with_star_keeps_everything() {
        let client = Arc::new(MemoryClient::with_keys(&["media/a.txt", "media/b/c.bin"], 10));
        let storage = storage(client);

        let found = storage.find("", &["*.png", "*"]).await.unwrap();

        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn find_anchors_absolute_masks_at_bucket_root() {
        let client = Arc::new(MemoryClient::with_keys(
            &["media/thumbs/a.png", "media/x/thumbs/b.png"],
            10,
        ));
        let storage = storage(client);

        let found = storage.find("", &["/media/thumbs/*"]).await.unwrap();

        assert_eq!(
            found.keys().cloned().collect::<Vec<_>>(),
            vec!["https://uploads.example.com/media/thumbs/a.png".to_string()]
        );
    }

    #[tokio::test]
    async fn find_rejects_malformed_mask() {
        let storage = storage(Arc::new(MemoryClient::default()));
        assert!(matches!(
            storage.find("", &["[a-"]).await,
            Err(StorageError::InvalidPattern(_))
        ));
    }

    #[test]
    fn reports_backend_and_location() {
        let storage = storage(Arc::new(MemoryClient::default()));
        assert_eq!(storage.backend_type(), StorageBackend::S3);
        assert_eq!(storage.location().base_path(), "uploads");
        assert_eq!(storage.location().relative_path(), "media");
    }
}
