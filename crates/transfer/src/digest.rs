//! Content digests, transactional and whole-object.

use sha2::{Digest, Sha256};

use crate::TransferError;

/// SHA-256 of one chunk's bytes, hex-encoded. Attached to the chunk's
/// request and compared against the server's echo; protects a single
/// network hop.
pub fn transactional_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Incremental digest over an object's logical content.
///
/// Fed in upload order, not network completion order. The finalized
/// value is stored as an object property and validated only when the
/// object is read back in full.
pub struct ContentDigest {
    hasher: Sha256,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Default for ContentDigest {
    fn default() -> Self {
        Self::new()
    }
}

/// Fails with `Integrity` when a computed digest disagrees with the
/// expected one. Never retried at this layer.
pub fn verify_digest(expected: &str, actual: &str) -> Result<(), TransferError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TransferError::Integrity { expected: expected.to_string(), actual: actual.to_string() })
    }
}
