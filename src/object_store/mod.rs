mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Read error: {0}")]
    Read(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// An object's bytes together with the content type recorded at upload, if any.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Abstraction over object storage backends.
/// Keys are full object names within the configured bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of all objects starting with `prefix`, in the backend's order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError>;
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<(), ObjectStoreError>;
    /// Fails with `NotFound` when there is nothing to delete.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}
