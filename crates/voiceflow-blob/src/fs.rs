use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use voiceflow_core::job::ObjectRef;

use crate::error::BlobError;
use crate::store::ObjectStore;

/// Filesystem-backed object store. Buckets map to directories under `root`,
/// object keys to files below them.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location to a path, rejecting keys that would escape the
    /// bucket directory.
    fn resolve(&self, location: &ObjectRef) -> Result<PathBuf, BlobError> {
        for part in location.key.split('/').chain(std::iter::once(location.bucket.as_str())) {
            if part.is_empty() || part == "." || part == ".." {
                return Err(BlobError::InvalidKey(location.to_string()));
            }
        }
        Ok(self.root.join(&location.bucket).join(&location.key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, location: &ObjectRef, bytes: Bytes) -> Result<(), BlobError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(object = %location, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn get(&self, location: &ObjectRef) -> Result<Bytes, BlobError> {
        let path = self.resolve(location)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, location: &ObjectRef) -> Result<(), BlobError> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(object = %location, "deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
