//! Object storage seam.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("listing {prefix} failed: {message}")]
    List { prefix: String, message: String },
    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },
    #[error("copy {from} -> {to} failed: {message}")]
    Copy {
        from: String,
        to: String,
        message: String,
    },
    #[error("delete of {key} failed: {message}")]
    Delete { key: String, message: String },
}

/// Bucket-scoped object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key under `prefix`, in the store's listing order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Store `data` under `key`. Large bodies may be sent in parts; a failed
    /// transfer must not leave parts behind.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Copy `from` to `to`, then delete `from`.
pub async fn move_object<S>(store: &S, from: &str, to: &str) -> Result<(), StorageError>
where
    S: ObjectStore + ?Sized,
{
    store.copy(from, to).await?;
    store.delete(from).await?;
    tracing::debug!(from, to, "object moved");
    Ok(())
}

/// Keys of real objects under `prefix`: drops the prefix marker and `/`-terminated folder markers.
pub fn object_keys(prefix: &str, keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter(|k| k != prefix && !k.ends_with('/'))
        .collect()
}
