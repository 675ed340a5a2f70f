//! In-memory implementations of the storage and vision seams.
//!
//! Used by unit tests here and by downstream crates through the
//! `test-util` feature. Nothing talks to the network.

use crate::storage::{ObjectStore, StorageError};
use crate::types::{FaceDetail, FaceMatch};
use crate::vision::{FaceVision, VisionError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Bucket backed by a sorted map, listing keys lexicographically like S3.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing_puts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a call.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: &str) {
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    /// Make every `put` whose key contains `pattern` fail.
    pub fn fail_puts_containing(&self, pattern: &str) {
        lock(&self.failing_puts).push(pattern.to_string());
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Number of calls made through the [`ObjectStore`] trait.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.count();
        Ok(lock(&self.objects)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.count();
        if lock(&self.failing_puts).iter().any(|p| key.contains(p.as_str())) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "injected failure".into(),
            });
        }
        self.insert(key, data, content_type);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.count();
        let mut objects = lock(&self.objects);
        let object = objects.get(from).cloned().ok_or_else(|| StorageError::Copy {
            from: from.to_string(),
            to: to.to_string(),
            message: "no such key".into(),
        })?;
        objects.insert(to.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.count();
        lock(&self.objects).remove(key);
        Ok(())
    }
}

/// Vision service with canned responses.
///
/// Unscripted detections return no faces; unscripted comparisons return no
/// matches. Scripted matches are returned verbatim, without applying the
/// threshold, and every call is recorded.
#[derive(Default)]
pub struct ScriptedVision {
    detections: HashMap<String, Result<Vec<FaceDetail>, VisionError>>,
    comparisons: HashMap<(String, String), Result<Vec<FaceMatch>, VisionError>>,
    detect_calls: Mutex<Vec<String>>,
    compare_calls: Mutex<Vec<(String, String, f32)>>,
}

impl ScriptedVision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, key: &str, count: usize) -> Self {
        let face = FaceDetail {
            bounding_box: None,
            confidence: 99.9,
        };
        self.detections
            .insert(key.to_string(), Ok(vec![face; count]));
        self
    }

    pub fn with_detect_error(mut self, key: &str, err: VisionError) -> Self {
        self.detections.insert(key.to_string(), Err(err));
        self
    }

    pub fn with_match(mut self, source: &str, target: &str, similarities: &[f32]) -> Self {
        let matches = similarities
            .iter()
            .map(|&similarity| FaceMatch { similarity })
            .collect();
        self.comparisons
            .insert((source.to_string(), target.to_string()), Ok(matches));
        self
    }

    pub fn with_compare_error(mut self, source: &str, target: &str, err: VisionError) -> Self {
        self.comparisons
            .insert((source.to_string(), target.to_string()), Err(err));
        self
    }

    pub fn detect_calls(&self) -> Vec<String> {
        lock(&self.detect_calls).clone()
    }

    /// `(source, target, threshold)` for every comparison, in call order.
    pub fn compare_calls(&self) -> Vec<(String, String, f32)> {
        lock(&self.compare_calls).clone()
    }
}

#[async_trait]
impl FaceVision for ScriptedVision {
    async fn detect_faces(&self, key: &str) -> Result<Vec<FaceDetail>, VisionError> {
        lock(&self.detect_calls).push(key.to_string());
        self.detections.get(key).cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn compare_faces(
        &self,
        source: &str,
        target: &str,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, VisionError> {
        lock(&self.compare_calls).push((source.to_string(), target.to_string(), threshold));
        self.comparisons
            .get(&(source.to_string(), target.to_string()))
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::move_object;

    #[tokio::test]
    async fn test_memory_store_list_is_prefix_scoped() {
        let store = MemoryObjectStore::new();
        store.insert("user/a/1.jpg", vec![1], "image/jpeg");
        store.insert("user/b/2.jpg", vec![2], "image/jpeg");
        assert_eq!(store.list("user/a/").await.unwrap(), vec!["user/a/1.jpg"]);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_move_object() {
        let store = MemoryObjectStore::new();
        store.insert("user/a/1.jpg", vec![1, 2, 3], "image/jpeg");
        move_object(&store, "user/a/1.jpg", "user/a/42/1.jpg").await.unwrap();
        assert_eq!(store.keys(), vec!["user/a/42/1.jpg"]);
        assert_eq!(
            store.get("user/a/42/1.jpg").map(|o| o.data),
            Some(Bytes::from_static(&[1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn test_copy_missing_key_fails() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.copy("nope", "x").await,
            Err(StorageError::Copy { .. })
        ));
    }
}
