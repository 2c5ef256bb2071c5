use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::{debug, info};

use marketfeed_core::config::{AwsConfig, StorageBackendKind, StorageConfig};

use crate::error::StorageError;

/// Where buckets live. Every component opens the buckets it needs by name.
pub enum StorageBackend {
    S3(AwsConfig),
    /// One subdirectory per bucket under the root.
    Local(PathBuf),
    /// Process-local buckets; the same name always yields the same store.
    Memory(Mutex<HashMap<String, Arc<InMemory>>>),
}

impl StorageBackend {
    pub fn from_config(aws: &AwsConfig, storage: &StorageConfig) -> Self {
        match storage.backend {
            StorageBackendKind::S3 => StorageBackend::S3(aws.clone()),
            StorageBackendKind::Local => StorageBackend::Local(storage.local_dir.clone()),
        }
    }

    pub fn in_memory() -> Self {
        StorageBackend::Memory(Mutex::new(HashMap::new()))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageBackend::S3(_))
    }

    /// Open a handle on `bucket`.
    pub fn open(&self, bucket: &str) -> Result<BlobStore, StorageError> {
        let store: Arc<dyn ObjectStore> = match self {
            StorageBackend::S3(aws) => Arc::new(build_s3(aws, bucket)?),
            StorageBackend::Local(root) => {
                let dir = root.join(bucket);
                std::fs::create_dir_all(&dir)?;
                let canonical = std::fs::canonicalize(&dir).unwrap_or(dir);
                let fs = LocalFileSystem::new_with_prefix(&canonical)
                    .map_err(|e| StorageError::Other(format!("local filesystem error: {e}")))?;
                debug!("Storage: local bucket {} at {}", bucket, canonical.display());
                Arc::new(fs)
            }
            StorageBackend::Memory(buckets) => {
                let mut buckets = buckets.lock().unwrap_or_else(|e| e.into_inner());
                buckets
                    .entry(bucket.to_string())
                    .or_insert_with(|| Arc::new(InMemory::new()))
                    .clone()
            }
        };
        Ok(BlobStore {
            bucket: bucket.to_string(),
            store,
        })
    }
}

fn build_s3(aws: &AwsConfig, bucket: &str) -> Result<object_store::aws::AmazonS3, StorageError> {
    // from_env picks up role credentials when no static keys are configured.
    let mut builder = AmazonS3Builder::from_env()
        .with_region(&aws.region)
        .with_bucket_name(bucket);

    if let Some(ref key) = aws.access_key_id {
        builder = builder.with_access_key_id(key);
    }
    if let Some(ref secret) = aws.secret_access_key {
        builder = builder.with_secret_access_key(secret);
    }
    if let Some(ref token) = aws.session_token {
        builder = builder.with_token(token);
    }
    if let Some(endpoint) = aws.endpoint() {
        builder = builder
            .with_allow_http(endpoint.starts_with("http://"))
            .with_endpoint(endpoint);
    }

    let store = builder.build()?;
    info!("Storage: S3 bucket s3://{} (region: {})", bucket, aws.region);
    Ok(store)
}

/// Key-addressed blob operations on a single bucket.
#[derive(Clone)]
pub struct BlobStore {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

impl BlobStore {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let size = data.len();
        self.store.put(&ObjectPath::from(key), data.into()).await?;
        debug!(bucket = %self.bucket, key, size, "Stored object");
        Ok(())
    }

    /// Upload a local file under `key`.
    pub async fn put_file(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        let data = tokio::fs::read(local).await?;
        self.put(key, Bytes::from(data)).await
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let result = self.store.get(&ObjectPath::from(key)).await?;
        Ok(result.bytes().await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(&ObjectPath::from(key)).await?;
        Ok(())
    }

    /// `Ok(false)` only for a definite "not found"; other failures are errors.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.store.head(&ObjectPath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
