use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use voiceflow_core::job::ObjectRef;

use crate::error::BlobError;
use crate::store::ObjectStore;

/// In-memory object store for tests and single-process development runs.
#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_key(location: &ObjectRef) -> String {
        format!("{}/{}", location.bucket, location.key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, location: &ObjectRef) -> bool {
        self.objects.contains_key(&Self::map_key(location))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, location: &ObjectRef, bytes: Bytes) -> Result<(), BlobError> {
        self.objects.insert(Self::map_key(location), bytes);
        Ok(())
    }

    async fn get(&self, location: &ObjectRef) -> Result<Bytes, BlobError> {
        self.objects
            .get(&Self::map_key(location))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::NotFound(location.to_string()))
    }

    async fn delete(&self, location: &ObjectRef) -> Result<(), BlobError> {
        self.objects.remove(&Self::map_key(location));
        Ok(())
    }
}
