// Object storage access. Deliveries name a bucket and a key; a factory
// turns the bucket into an `ObjectStore` so the same fetch path serves S3
// in production and a directory tree in development.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use humansize::{DECIMAL, format_size};
use log::info;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::{Error as ObjectStoreError, ObjectStore, path::Path as ObjectPath};
use serde::{Deserialize, Serialize};

pub trait ObjectStoreFactory: Send + Sync {
    fn store_for_bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// AWS S3, configured from the standard `AWS_*` environment
    #[default]
    S3,
    /// Each bucket is a subdirectory of `root`
    Local { root: PathBuf },
}

impl StorageConfig {
    pub fn factory(&self) -> Arc<dyn ObjectStoreFactory> {
        match self {
            StorageConfig::S3 => Arc::new(S3StoreFactory),
            StorageConfig::Local { root } => Arc::new(LocalStoreFactory::new(root)),
        }
    }
}

pub struct S3StoreFactory;

impl ObjectStoreFactory for S3StoreFactory {
    fn store_for_bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Arc::new(store))
    }
}

pub struct LocalStoreFactory {
    root: PathBuf,
}

impl LocalStoreFactory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ObjectStoreFactory for LocalStoreFactory {
    fn store_for_bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        let bucket_path = self.root.join(bucket);
        std::fs::create_dir_all(&bucket_path).map_err(|e| ObjectStoreError::Generic {
            store: "LocalFileSystem",
            source: Box::new(e),
        })?;

        Ok(Arc::new(LocalFileSystem::new_with_prefix(bucket_path)?))
    }
}

/// Where a delivered file lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone)]
pub struct FetchedFile {
    /// The object key, which carries the export's original file name
    pub filename: String,
    pub bytes: bytes::Bytes,
}

pub async fn fetch(
    stores: &dyn ObjectStoreFactory,
    location: &ObjectLocation,
) -> Result<FetchedFile, ObjectStoreError> {
    let store = stores.store_for_bucket(&location.bucket)?;
    let path = ObjectPath::parse(&location.key)?;
    let bytes = store.get(&path).await?.bytes().await?;

    info!(
        "Fetched {location} ({})",
        format_size(bytes.len(), DECIMAL)
    );

    Ok(FetchedFile {
        filename: location.key.clone(),
        bytes,
    })
}
