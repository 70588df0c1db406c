//! Cloud object stores (`s3://`, `gs://`, `az://`)
//!
//! Wraps an `object_store::ObjectStore` in the blocking `ObjectClient`
//! interface. Each client owns a current-thread tokio runtime and blocks on
//! it for every request. Credentials, region and endpoint come from the
//! provider environment variables (`AWS_*`, `GOOGLE_*`, `AZURE_*`).

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::storage::object::ObjectClient;
use crate::storage::{StorageError, StorageResult};

/// Schemes served by `ObjectStoreClient::for_bucket`
pub const SCHEMES: &[&str] = &["s3", "gs", "az"];

fn backend(error: object_store::Error) -> StorageError {
    StorageError::Backend(error.to_string())
}

/// Blocking adapter over an async object store
#[derive(Debug)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> StorageResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| StorageError::Backend(format!("failed to start I/O runtime: {}", error)))?;
        Ok(Self { store, runtime })
    }

    /// Client for one bucket (S3, GCS) or container (Azure)
    pub fn for_bucket(scheme: &str, bucket: &str) -> StorageResult<Self> {
        let store: Arc<dyn ObjectStore> = match scheme {
            "s3" => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(backend)?,
            ),
            "gs" => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(backend)?,
            ),
            "az" => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_container_name(bucket)
                    .build()
                    .map_err(backend)?,
            ),
            other => return Err(StorageError::UnsupportedScheme(other.to_string())),
        };
        debug!(scheme, bucket, "Opened object store");
        Self::new(store)
    }
}

impl ObjectClient for ObjectStoreClient {
    fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let location = ObjectPath::from(key);
        self.runtime.block_on(async {
            match self.store.get(&location).await {
                Ok(result) => result
                    .bytes()
                    .await
                    .map(|bytes| Some(bytes.to_vec()))
                    .map_err(backend),
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(error) => Err(backend(error)),
            }
        })
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> StorageResult<()> {
        let location = ObjectPath::from(key);
        self.runtime
            .block_on(self.store.put(&location, PutPayload::from(body)))
            .map(|_| ())
            .map_err(backend)
    }

    fn delete_object(&self, key: &str) -> StorageResult<()> {
        let location = ObjectPath::from(key);
        match self.runtime.block_on(self.store.delete(&location)) {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(error) => Err(backend(error)),
        }
    }

    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // object_store lists whole path segments; `prefix` is either empty or ends with '/'
        let dir = prefix.trim_end_matches('/');
        let dir = (!dir.is_empty()).then(|| ObjectPath::from(dir));

        let objects: Vec<ObjectMeta> = self
            .runtime
            .block_on(self.store.list(dir.as_ref()).try_collect())
            .map_err(backend)?;

        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::manager::{CacheManager, ClearTarget};
    use crate::cache::version::VersionSpec;
    use crate::storage::object::ObjectStorage;
    use object_store::memory::InMemory;
    use serde_json::json;

    fn in_memory() -> Arc<ObjectStoreClient> {
        Arc::new(ObjectStoreClient::new(Arc::new(InMemory::new())).unwrap())
    }

    #[test]
    fn test_put_get_delete() {
        let client = in_memory();
        client.put_object("pbi/apps/v1/apps.json", b"{}".to_vec()).unwrap();

        assert_eq!(
            client.get_object("pbi/apps/v1/apps.json").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(client.get_object("pbi/missing.json").unwrap(), None);

        client.delete_object("pbi/apps/v1/apps.json").unwrap();
        client.delete_object("pbi/apps/v1/apps.json").unwrap();
        assert_eq!(client.get_object("pbi/apps/v1/apps.json").unwrap(), None);
    }

    #[test]
    fn test_list_objects_by_directory_prefix() {
        let client = in_memory();
        for key in ["pbi/a/1/a.json", "pbi/a/2/a.json", "pbi/ab/1/ab.json", "other/x.json"] {
            client.put_object(key, b"1".to_vec()).unwrap();
        }

        assert_eq!(
            client.list_objects("pbi/a/").unwrap(),
            vec!["pbi/a/1/a.json", "pbi/a/2/a.json"]
        );
        assert_eq!(client.list_objects("").unwrap().len(), 4);
        assert!(client.list_objects("nothing/").unwrap().is_empty());
    }

    #[test]
    fn test_cache_round_trip_over_object_store() {
        let storage = ObjectStorage::new(in_memory(), "pbi/cache", "s3://test-bucket/pbi/cache");
        let cache = CacheManager::with_storage(CacheConfig::default(), Box::new(storage));

        cache.save("workspaces", &json!({"value": [1]}), Some("20240101_120000"), None).unwrap();
        cache.save("workspaces", &json!({"value": [2]}), Some("20240201_120000"), None).unwrap();
        cache.save("apps", &json!([]), Some("v1"), None).unwrap();

        assert_eq!(cache.list_keys(), vec!["apps", "workspaces"]);
        assert_eq!(
            cache.list_versions("workspaces"),
            vec!["20240201_120000", "20240101_120000"]
        );
        assert_eq!(
            cache.load("workspaces", VersionSpec::Latest).unwrap().data,
            json!({"value": [2]})
        );

        assert!(cache.clear(&ClearTarget::Key("workspaces".to_string())));
        assert_eq!(cache.list_keys(), vec!["apps"]);
        assert_eq!(
            cache.root_location().as_deref(),
            Some("s3://test-bucket/pbi/cache")
        );
    }

    #[test]
    fn test_for_bucket_rejects_unknown_scheme() {
        let err = ObjectStoreClient::for_bucket("ftp", "bucket").unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn test_for_bucket_builds_s3_client_offline() {
        assert!(ObjectStoreClient::for_bucket("s3", "pbi-test-bucket").is_ok());
    }
}
