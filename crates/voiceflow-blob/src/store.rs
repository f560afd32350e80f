use async_trait::async_trait;
use bytes::Bytes;

use voiceflow_core::job::ObjectRef;

use crate::error::BlobError;

/// Capability surface of the external object store.
///
/// Writes are keyed; putting to an existing location overwrites, so
/// redelivered work items never accumulate duplicate artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, location: &ObjectRef, bytes: Bytes) -> Result<(), BlobError>;

    async fn get(&self, location: &ObjectRef) -> Result<Bytes, BlobError>;

    /// Delete an object. Deleting a location that does not exist is success;
    /// cleanup is allowed to run more than once.
    async fn delete(&self, location: &ObjectRef) -> Result<(), BlobError>;
}
