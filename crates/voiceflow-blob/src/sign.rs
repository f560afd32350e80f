use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use voiceflow_core::job::ObjectRef;

/// Mints and verifies short-lived signed artifact URLs.
///
/// A signed URL grants credential-free read access to exactly one object
/// until `expires` (unix seconds). URLs are minted at read time, so their
/// validity window is measured from the moment of observation. That also
/// means a URL can outlive the underlying object once cleanup runs.
pub struct UrlSigner {
    secret: SecretString,
}

impl UrlSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Produce a relative signed URL for the artifact download route.
    pub fn presign(&self, location: &ObjectRef, ttl: Duration) -> String {
        let expires = unix_now() + ttl.as_secs() as i64;
        let sig = self.signature(location, expires);
        format!(
            "/v1/artifacts/{}/{}?expires={expires}&sig={sig}",
            location.bucket, location.key
        )
    }

    pub fn signature(&self, location: &ObjectRef, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(b"\n");
        hasher.update(location.bucket.as_bytes());
        hasher.update(b"\n");
        hasher.update(location.key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Check a presented signature against `now` (unix seconds).
    pub fn verify(&self, location: &ObjectRef, expires: i64, sig: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        self.signature(location, expires) == sig
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
