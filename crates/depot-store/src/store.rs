//! # Artifact Store
//!
//! Owns the store root, the staging area for in-flight uploads, and the
//! in-memory name→digest index. The layout on disk:
//!
//! ```text
//! {root}/
//!   upload-{random}      — staging files for in-flight uploads
//!   artifacts/
//!     {name}             — one flat file per committed artifact
//! ```
//!
//! ## Commit Invariant
//!
//! An upload is streamed into a staging file first and only ever reaches
//! its final name through a same-filesystem rename, so a reader sees
//! either the old complete content or the new complete content under a
//! committed name — never a truncated mix. The digest is computed *after*
//! the rename, so the index never reflects unfinished writes.
//!
//! ## Index
//!
//! The index is rebuilt from the directory listing at startup (there is
//! no persisted index file — the directory plus rehash is the source of
//! truth) and mutated only on successful commit. There is a brief window
//! after the rename and before the index update where a lookup returns
//! the previous digest paired with the new content; this only affects
//! ETag freshness, never the correctness of served bytes.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::digest::{self, ArtifactDigest};
use crate::error::StoreError;
use crate::name::ArtifactName;

/// Prefix for staging files in the store root. The orphan sweep only
/// ever touches files carrying this prefix.
const STAGING_PREFIX: &str = "upload-";

/// Name of the committed-artifacts directory under the store root.
const ARTIFACTS_DIR: &str = "artifacts";

// ── Scan report ─────────────────────────────────────────────────────────────

/// One file the startup scan could not index.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    /// File name as found in the artifacts directory.
    pub file: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of the startup directory scan.
///
/// The scan is best-effort: a failure on one file never aborts the scan,
/// but every skipped file is recorded here instead of being silently
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Number of artifacts successfully hashed and indexed.
    pub indexed: usize,
    /// Files that were present but could not be indexed.
    pub failures: Vec<ScanFailure>,
}

// ── Staged upload ───────────────────────────────────────────────────────────

/// A writable staging file for an in-flight upload.
///
/// Lives in the store root (sibling of, not inside, the artifacts
/// directory) with an unpredictable suffix, so concurrent uploads never
/// collide. Owned exclusively by the in-flight request. Dropping it
/// without committing deletes the file, so abandoned uploads leave
/// nothing behind.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Path of the staging file while the upload is in flight.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Write for StagedUpload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

// ── Artifact ────────────────────────────────────────────────────────────────

/// A committed artifact as seen by a reader: its canonical path and the
/// digest the index currently records for it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub digest: ArtifactDigest,
}

// ── ArtifactStore ───────────────────────────────────────────────────────────

/// The artifact store: staging, atomic commit, and the name→digest index.
///
/// All methods take `&self`; the index is guarded by a `parking_lot`
/// `RwLock` (sync — never held across an `.await`). Concurrent commits
/// to distinct names do not conflict; concurrent commits to the same
/// name are last-writer-wins.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    artifacts_dir: PathBuf,
    index: RwLock<HashMap<ArtifactName, ArtifactDigest>>,
    scan_report: ScanReport,
}

impl ArtifactStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Creates `root` and `root/artifacts` recursively, then rebuilds
    /// the index by hashing every regular file in the artifacts
    /// directory. Per-file failures — unreadable files, names that fail
    /// validation — are recorded in the [`ScanReport`] and logged, but
    /// never abort the scan.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let artifacts_dir = root.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts_dir).map_err(|source| StoreError::Unavailable {
            path: artifacts_dir.clone(),
            source,
        })?;

        let mut index = HashMap::new();
        let mut report = ScanReport::default();

        let entries = fs::read_dir(&artifacts_dir).map_err(|source| StoreError::Unavailable {
            path: artifacts_dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Unavailable {
                path: artifacts_dir.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(name_str) = file_name.to_str() else {
                report.failures.push(ScanFailure {
                    file: file_name.to_string_lossy().into_owned(),
                    reason: "file name is not valid UTF-8".into(),
                });
                continue;
            };
            match entry.file_type() {
                Ok(t) if t.is_file() => {}
                Ok(_) => continue, // non-recursive scan: skip subdirectories etc.
                Err(e) => {
                    report.failures.push(ScanFailure {
                        file: name_str.to_string(),
                        reason: format!("file type check failed: {e}"),
                    });
                    continue;
                }
            }
            let name = match ArtifactName::new(name_str) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(file = name_str, error = %e, "skipping unindexable file");
                    report.failures.push(ScanFailure {
                        file: name_str.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match digest::hash_file(&entry.path()) {
                Ok(d) => {
                    index.insert(name, d);
                    report.indexed += 1;
                }
                Err(e) => {
                    tracing::warn!(file = name_str, error = %e, "could not hash file during scan");
                    report.failures.push(ScanFailure {
                        file: name_str.to_string(),
                        reason: format!("hash failed: {e}"),
                    });
                }
            }
        }

        Ok(Self {
            root,
            artifacts_dir,
            index: RwLock::new(index),
            scan_report: report,
        })
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// What the startup scan found.
    pub fn scan_report(&self) -> &ScanReport {
        &self.scan_report
    }

    /// Number of artifacts currently indexed.
    pub fn artifact_count(&self) -> usize {
        self.index.read().len()
    }

    /// Canonical path of the artifact for `name`.
    ///
    /// A plain join — `name` is already validated to be a single path
    /// component, so it cannot escape the artifacts directory.
    pub fn artifact_path(&self, name: &ArtifactName) -> PathBuf {
        self.artifacts_dir.join(name.as_str())
    }

    /// Create a staging file for a new upload.
    ///
    /// The file is created in the store root with the `upload-` prefix
    /// and a random suffix. Stream the body into it via `io::Write`,
    /// then hand it to [`commit()`](ArtifactStore::commit).
    pub fn begin_upload(&self) -> Result<StagedUpload, StoreError> {
        let file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.root)?;
        Ok(StagedUpload { file })
    }

    /// Commit a staged upload under `name`, replacing any existing
    /// artifact of that name.
    ///
    /// The staged file is renamed into the artifacts directory — the
    /// staging area is a sibling directory on the same filesystem, so
    /// the rename is atomic from a reader's point of view. The file is
    /// rehashed at its final path and the index entry is updated.
    ///
    /// On rename failure the staging file is deleted and the previous
    /// artifact and index entry are untouched. If the post-rename hash
    /// fails, the now-stale index entry for `name` is dropped and the
    /// error is returned; the process keeps serving and the entry is
    /// repaired by the next commit or restart scan.
    pub fn commit(
        &self,
        staged: StagedUpload,
        name: &ArtifactName,
    ) -> Result<ArtifactDigest, StoreError> {
        let dest = self.artifact_path(name);
        // PersistError hands the temp file back; dropping it removes the
        // staged bytes so a failed commit leaves no orphan behind.
        staged.file.persist(&dest).map_err(|e| StoreError::Commit {
            name: name.to_string(),
            source: e.error,
        })?;

        match digest::hash_file(&dest) {
            Ok(digest) => {
                self.index.write().insert(name.clone(), digest);
                Ok(digest)
            }
            Err(source) => {
                tracing::error!(
                    model = %name,
                    error = %source,
                    "post-commit hash failed; dropping index entry"
                );
                self.index.write().remove(name);
                Err(StoreError::Hash {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Look up the committed artifact for `name`.
    ///
    /// Returns `None` if no artifact has been committed under the name.
    /// Pure read — takes the read lock only.
    pub fn lookup(&self, name: &ArtifactName) -> Option<Artifact> {
        let digest = *self.index.read().get(name)?;
        Some(Artifact {
            path: self.artifact_path(name),
            digest,
        })
    }

    /// Delete staging files older than `max_age` from the store root.
    ///
    /// Crashed processes and aborted client connections can strand
    /// `upload-*` files; this sweep reclaims them. Only files carrying
    /// the staging prefix are considered. Returns the number removed.
    pub fn sweep_stale_uploads(&self, max_age: Duration) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with(STAGING_PREFIX) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let stale = matches!(modified.elapsed(), Ok(age) if age >= max_age);
            if stale && fs::remove_file(entry.path()).is_ok() {
                tracing::info!(file = name, "removed stale staging file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn commit_bytes(store: &ArtifactStore, name: &ArtifactName, bytes: &[u8]) -> ArtifactDigest {
        let mut staged = store.begin_upload().unwrap();
        staged.write_all(bytes).unwrap();
        store.commit(staged, name).unwrap()
    }

    #[test]
    fn open_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("depot");
        let store = ArtifactStore::open(&root).unwrap();
        assert!(root.join(ARTIFACTS_DIR).is_dir());
        assert_eq!(store.artifact_count(), 0);
    }

    #[test]
    fn open_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"not a directory").unwrap();

        let err = ArtifactStore::open(&blocked).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn commit_then_lookup() {
        let (_dir, store) = open_store();
        let name = ArtifactName::new("nlu.tar.gz").unwrap();

        let digest = commit_bytes(&store, &name, b"model bytes");

        let artifact = store.lookup(&name).unwrap();
        assert_eq!(artifact.digest, digest);
        assert_eq!(fs::read(&artifact.path).unwrap(), b"model bytes");
        assert_eq!(artifact.path, store.artifact_path(&name));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        let (_dir, store) = open_store();
        let name = ArtifactName::new("never-committed").unwrap();
        assert!(store.lookup(&name).is_none());
    }

    #[test]
    fn recommit_is_last_writer_wins() {
        let (_dir, store) = open_store();
        let name = ArtifactName::new("core").unwrap();

        let first = commit_bytes(&store, &name, b"version one");
        let second = commit_bytes(&store, &name, b"version two");
        assert_ne!(first, second);

        let artifact = store.lookup(&name).unwrap();
        assert_eq!(artifact.digest, second);
        assert_eq!(fs::read(&artifact.path).unwrap(), b"version two");
    }

    #[test]
    fn reopen_rebuilds_index_with_matching_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let a = ArtifactName::new("model-a").unwrap();
        let b = ArtifactName::new("model-b").unwrap();

        let (digest_a, digest_b) = {
            let store = ArtifactStore::open(dir.path()).unwrap();
            (
                commit_bytes(&store, &a, b"alpha content"),
                commit_bytes(&store, &b, b"beta content"),
            )
        };

        let reopened = ArtifactStore::open(dir.path()).unwrap();
        assert_eq!(reopened.artifact_count(), 2);
        assert!(reopened.scan_report().failures.is_empty());
        assert_eq!(reopened.lookup(&a).unwrap().digest, digest_a);
        assert_eq!(reopened.lookup(&b).unwrap().digest, digest_b);
    }

    #[test]
    fn scan_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(ARTIFACTS_DIR).join("subdir")).unwrap();

        let store = ArtifactStore::open(dir.path()).unwrap();
        assert_eq!(store.artifact_count(), 0);
        // Not a regular file — skipped without being reported as a failure.
        assert!(store.scan_report().failures.is_empty());
    }

    #[test]
    fn scan_reports_unindexable_names_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts).unwrap();
        fs::write(artifacts.join("good-model"), b"fine").unwrap();
        // Interior control character: a valid file name, but not a valid
        // artifact name.
        fs::write(artifacts.join("bad\u{1}name"), b"skipped").unwrap();

        let store = ArtifactStore::open(dir.path()).unwrap();
        assert_eq!(store.artifact_count(), 1);
        let report = store.scan_report();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].file.contains("bad"));
    }

    #[test]
    fn staging_file_is_deleted_on_drop() {
        let (_dir, store) = open_store();
        let path = {
            let mut staged = store.begin_upload().unwrap();
            staged.write_all(b"abandoned").unwrap();
            staged.path().to_path_buf()
            // dropped here without commit
        };
        assert!(!path.exists());
    }

    #[test]
    fn staging_files_live_beside_artifacts_dir() {
        let (_dir, store) = open_store();
        let staged = store.begin_upload().unwrap();
        assert_eq!(staged.path().parent().unwrap(), store.root());
        assert!(staged
            .path()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with(STAGING_PREFIX));
    }

    #[test]
    fn failed_commit_leaves_previous_artifact_and_index_intact() {
        let (_dir, store) = open_store();
        let good = ArtifactName::new("kept").unwrap();
        let kept_digest = commit_bytes(&store, &good, b"keep me");

        // Renaming a file onto an existing directory fails, which stands
        // in for any rename-level failure.
        let blocked = ArtifactName::new("blocked").unwrap();
        fs::create_dir(store.artifact_path(&blocked)).unwrap();

        let mut staged = store.begin_upload().unwrap();
        staged.write_all(b"will not land").unwrap();
        let staged_path = staged.path().to_path_buf();
        let err = store.commit(staged, &blocked).unwrap_err();
        assert!(matches!(err, StoreError::Commit { .. }));

        // The staged file was cleaned up and nothing else changed.
        assert!(!staged_path.exists());
        assert!(store.lookup(&blocked).is_none());
        let kept = store.lookup(&good).unwrap();
        assert_eq!(kept.digest, kept_digest);
        assert_eq!(fs::read(&kept.path).unwrap(), b"keep me");
    }

    #[cfg(unix)]
    #[test]
    fn post_commit_hash_failure_drops_index_entry() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = open_store();
        let name = ArtifactName::new("turns-unreadable").unwrap();
        commit_bytes(&store, &name, b"readable version");
        assert!(store.lookup(&name).is_some());

        let mut staged = store.begin_upload().unwrap();
        staged.write_all(b"replacement").unwrap();
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o000)).unwrap();
        // File modes do not bind a privileged user; nothing to observe then.
        if fs::File::open(staged.path()).is_ok() {
            return;
        }

        let err = store.commit(staged, &name).unwrap_err();
        assert!(matches!(err, StoreError::Hash { .. }));

        // The rename landed, so the old hash would be a lie: the stale
        // entry is dropped rather than served.
        assert!(store.artifact_path(&name).exists());
        assert!(store.lookup(&name).is_none());

        // The store keeps serving; a later successful commit repairs the
        // entry.
        fs::set_permissions(
            store.artifact_path(&name),
            fs::Permissions::from_mode(0o600),
        )
        .unwrap();
        let digest = commit_bytes(&store, &name, b"repaired version");
        assert_eq!(store.lookup(&name).unwrap().digest, digest);
    }

    #[cfg(unix)]
    #[test]
    fn scan_reports_unreadable_files_without_aborting() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts).unwrap();
        fs::write(artifacts.join("readable"), b"fine").unwrap();
        let locked = artifacts.join("locked");
        fs::write(&locked, b"no peeking").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            return;
        }

        let store = ArtifactStore::open(dir.path()).unwrap();
        let report = store.scan_report();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "locked");
        assert!(report.failures[0].reason.contains("hash failed"));

        let name = ArtifactName::new("readable").unwrap();
        assert!(store.lookup(&name).is_some());
        let locked_name = ArtifactName::new("locked").unwrap();
        assert!(store.lookup(&locked_name).is_none());
    }

    #[test]
    fn concurrent_commits_to_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let name = ArtifactName::new(&format!("model-{i}")).unwrap();
                    let content = format!("content for model {i}").into_bytes();
                    let mut staged = store.begin_upload().unwrap();
                    staged.write_all(&content).unwrap();
                    let digest = store.commit(staged, &name).unwrap();
                    (name, content, digest)
                })
            })
            .collect();

        for handle in handles {
            let (name, content, digest) = handle.join().unwrap();
            let artifact = store.lookup(&name).unwrap();
            assert_eq!(artifact.digest, digest);
            assert_eq!(fs::read(&artifact.path).unwrap(), content);
        }
        assert_eq!(store.artifact_count(), 8);
    }

    #[test]
    fn sweep_removes_only_stale_staging_files() {
        let (_dir, store) = open_store();
        // An orphan left behind by a crashed process.
        let orphan = store.root().join("upload-orphaned123");
        fs::write(&orphan, b"half an upload").unwrap();
        // An unrelated file in the root must survive the sweep.
        let unrelated = store.root().join("notes.txt");
        fs::write(&unrelated, b"keep").unwrap();

        // max_age of zero makes every staging file stale.
        let removed = store.sweep_stale_uploads(Duration::ZERO).unwrap();
        assert_eq!(removed, 1);
        assert!(!orphan.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn sweep_keeps_fresh_staging_files() {
        let (_dir, store) = open_store();
        let fresh = store.root().join("upload-inflight");
        fs::write(&fresh, b"still uploading").unwrap();

        let removed = store.sweep_stale_uploads(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(fresh.exists());
    }

    #[test]
    fn sweep_never_touches_committed_artifacts() {
        let (_dir, store) = open_store();
        let name = ArtifactName::new("upload-shaped-name").unwrap();
        commit_bytes(&store, &name, b"committed content");

        // The artifact's name starts with the staging prefix, but it
        // lives in artifacts/, which the sweep does not visit.
        let removed = store.sweep_stale_uploads(Duration::ZERO).unwrap();
        assert_eq!(removed, 0);
        assert!(store.lookup(&name).is_some());
    }
}
