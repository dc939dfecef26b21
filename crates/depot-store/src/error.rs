//! # Store Error Types
//!
//! Structured errors for the artifact store, built with `thiserror`.
//! Each variant carries the diagnostic context an operator needs: the
//! path or artifact name involved and the underlying I/O failure.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from artifact store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store's directories could not be created or scanned.
    #[error("storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact name failed validation and never reached the filesystem.
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    /// The rename from staging into the artifacts directory failed.
    /// The previously committed artifact (if any) is untouched.
    #[error("commit of '{name}' failed: {source}")]
    Commit {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Hash computation failed after the rename landed. The index entry
    /// for the name has been dropped; a later commit or a restart scan
    /// repairs it.
    #[error("hash computation for '{name}' failed: {source}")]
    Hash {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from staging-file creation or the orphan sweep.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
