//! # Content Digests
//!
//! Defines [`ArtifactDigest`], the SHA-256 content hash of a committed
//! artifact, and [`hash_file`] which computes one by streaming a file
//! through the hasher in fixed-size chunks.
//!
//! The base64 rendering (standard alphabet, padded) is the token the
//! transport layer hands out as the `ETag` validator, so two digests
//! compare equal exactly when their ETag strings do.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha256};

/// Read buffer size for streaming hash computation.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// The SHA-256 digest of an artifact's full byte content.
///
/// The raw 32 bytes and the base64 rendering identify the same content;
/// the rendering exists only for display and ETag comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactDigest([u8; 32]);

impl ArtifactDigest {
    /// Construct a digest from raw SHA-256 output.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as standard base64 — the ETag token.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Compute the [`ArtifactDigest`] of the file at `path`.
///
/// Streams the file through SHA-256 in [`HASH_BUF_SIZE`] chunks, so the
/// whole artifact is never held in memory.
pub fn hash_file(path: &Path) -> std::io::Result<ArtifactDigest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ArtifactDigest(hasher.finalize().into()))
}
