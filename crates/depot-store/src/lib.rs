//! # depot-store — Artifact Store Core
//!
//! Lifecycle management for named model artifacts:
//!
//! - **Staging** — uploads stream into uniquely-named temporary files in
//!   the store root, cleaned up automatically on every non-commit path.
//! - **Atomic commit** — a same-filesystem rename makes a fully-written
//!   file visible under its final name; readers never see partial content.
//! - **Index** — an in-memory name→digest map, rebuilt from the directory
//!   listing at startup, answering lookups and backing conditional GET.
//!
//! The transport layer (see `depot-api`) is a thin collaborator: it
//! supplies a byte stream and a validated [`ArtifactName`], and turns
//! store results into HTTP responses.

pub mod digest;
pub mod error;
pub mod name;
pub mod store;

pub use digest::{hash_file, ArtifactDigest};
pub use error::StoreError;
pub use name::ArtifactName;
pub use store::{Artifact, ArtifactStore, ScanFailure, ScanReport, StagedUpload};
