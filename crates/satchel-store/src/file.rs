//! File-backed session store.
//!
//! One file per session, `sess_<id>.json`, inside a single directory.
//! Survives restarts and can be shared by several processes on one host.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use satchel_data::{Codec, JsonCodec, SessionData, SessionId};
use serde::{Deserialize, Serialize};

use crate::{ExpiringStore, SessionStore, StoreError};

/// Counter for unique temp-file names within this process.
static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(1);

const FILE_PREFIX: &str = "sess_";
const FILE_SUFFIX: &str = ".json";

/// Longest identifier accepted as part of a file name.
const MAX_ID_LEN: usize = 128;

/// What actually lands on disk.
///
/// `expires_at` is absolute unix seconds, so the deadline means the same
/// thing to every process reading the directory.
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    expires_at: Option<u64>,
    data: SessionData,
}

impl FileRecord {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// A [`SessionStore`] that keeps each session in its own file.
///
/// Writes go to a temp file first and are then renamed over the real one,
/// so a reader never sees a half-written record.
///
/// Identifiers become part of a path, so only ASCII letters, digits, `-`
/// and `_` are accepted. Anything else fails with
/// [`StoreError::InvalidId`] before the file system is touched.
///
/// ## Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use satchel_store::FileStore;
///
/// # async fn demo() -> Result<(), satchel_store::StoreError> {
/// let store = FileStore::open("/var/lib/myapp/sessions")
///     .await?
///     .with_ttl(Duration::from_secs(900));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore<C: Codec = JsonCodec> {
    dir: PathBuf,
    ttl: Option<Duration>,
    codec: C,
}

impl FileStore<JsonCodec> {
    /// Opens (and creates, if needed) a store rooted at `dir`, using JSON.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_codec(dir, JsonCodec).await
    }
}

impl<C: Codec> FileStore<C> {
    /// Opens (and creates, if needed) a store rooted at `dir` with a
    /// custom codec.
    pub async fn open_with_codec(dir: impl Into<PathBuf>, codec: C) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "file store opened");
        Ok(Self {
            dir,
            ttl: None,
            codec,
        })
    }

    /// Makes records expire `ttl` after their last save.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The configured time-to-live, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn path_for(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        let raw = id.as_str();
        let usable = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !usable {
            return Err(StoreError::InvalidId(id.clone()));
        }
        Ok(self.dir.join(format!("{FILE_PREFIX}{raw}{FILE_SUFFIX}")))
    }

    /// Reads and decodes one record. A missing file is `Ok(None)`.
    async fn read_record(
        &self,
        id: &SessionId,
        path: &Path,
    ) -> Result<Option<FileRecord>, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                id: id.clone(),
                source,
            })
    }

    /// Reads a record and treats expired ones as missing, deleting them on
    /// the way.
    async fn read_live(&self, id: &SessionId) -> Result<Option<FileRecord>, StoreError> {
        let path = self.path_for(id)?;
        match self.read_record(id, &path).await? {
            Some(record) if record.is_expired(unix_now()) => {
                remove_if_present(&path).await?;
                tracing::debug!(session = %id.short(), "file store dropped expired record");
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

impl<C: Codec> SessionStore for FileStore<C> {
    async fn load(&self, id: &SessionId) -> Result<SessionData, StoreError> {
        Ok(self
            .read_live(id)
            .await?
            .map(|record| record.data)
            .unwrap_or_default())
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        let record = FileRecord {
            expires_at: self.ttl.map(|ttl| unix_now().saturating_add(ttl.as_secs())),
            data: data.clone(),
        };
        let bytes = self.codec.encode(&record).map_err(StoreError::Encoding)?;

        let temp = self.dir.join(format!(
            ".{FILE_PREFIX}{id}.{}.{}.tmp",
            std::process::id(),
            NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::Io(e));
        }

        tracing::trace!(session = %id.short(), bytes = bytes.len(), "file store saved record");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        remove_if_present(&path).await
    }

    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.read_live(id).await?.is_some())
    }
}

impl<C: Codec> ExpiringStore for FileStore<C> {
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = unix_now();
        let mut purged = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(FILE_PREFIX))
                .and_then(|name| name.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            let id = SessionId::from(id);
            let path = entry.path();

            match self.read_record(&id, &path).await {
                Ok(Some(record)) if record.is_expired(now) => {
                    remove_if_present(&path).await?;
                    purged += 1;
                }
                Ok(_) => {}
                // Leave unreadable records for a human; don't abort the sweep.
                Err(e) => {
                    tracing::warn!(
                        session = %id.short(),
                        error = %e,
                        "skipping unreadable session file"
                    );
                }
            }
        }

        if purged > 0 {
            tracing::debug!(purged, dir = %self.dir.display(), "file store purged expired records");
        }
        Ok(purged)
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    //! Expiry uses the wall clock here (the deadline must be meaningful to
    //! other processes), so instead of advancing time the tests use a
    //! zero TTL (expired immediately) or a long one (never expires during
    //! the test).

    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> SessionData {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    async fn store_in(dir: &tempfile::TempDir) -> FileStore {
        FileStore::open(dir.path()).await.expect("temp dir is writable")
    }

    #[tokio::test]
    async fn test_open_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");

        let store = FileStore::open(&nested).await.expect("should create dirs");

        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let id = SessionId::from("abc");

        store.save(&id, &payload(&[("k", "v")])).await.unwrap();

        // A second store over the same directory sees the record.
        let other = store_in(&dir).await;
        assert_eq!(other.load(&id).await.unwrap(), payload(&[("k", "v")]));
        assert!(dir.path().join("sess_abc.json").is_file());
    }

    #[tokio::test]
    async fn test_load_unknown_id_returns_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        assert!(store.load(&SessionId::from("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.save(&SessionId::from("a"), &payload(&[("k", "1")])).await.unwrap();
        store.save(&SessionId::from("a"), &payload(&[("k", "2")])).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["sess_a.json".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_tolerates_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let id = SessionId::from("abc");
        store.save(&id, &payload(&[("k", "v")])).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();

        assert!(!store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        for bad in ["../etc/passwd", "a/b", "", "with space", "dot.dot"] {
            let result = store.load(&SessionId::from(bad)).await;
            assert!(
                matches!(result, Err(StoreError::InvalidId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_reports_corrupt_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        std::fs::write(dir.path().join("sess_abc.json"), b"{definitely not").unwrap();

        let result = store.load(&SessionId::from("abc")).await;

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_zero_ttl_record_reads_as_absent_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await.with_ttl(Duration::ZERO);
        let id = SessionId::from("abc");
        store.save(&id, &payload(&[("k", "v")])).await.unwrap();

        assert!(store.load(&id).await.unwrap().is_empty());
        assert!(!dir.path().join("sess_abc.json").exists());
    }

    #[tokio::test]
    async fn test_long_ttl_record_stays_live() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await.with_ttl(Duration::from_secs(3600));
        let id = SessionId::from("abc");

        store.save(&id, &payload(&[("k", "v")])).await.unwrap();

        assert!(store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired_counts_and_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let expiring = store_in(&dir).await.with_ttl(Duration::ZERO);
        let keeping = store_in(&dir).await;
        expiring.save(&SessionId::from("old1"), &payload(&[("k", "1")])).await.unwrap();
        expiring.save(&SessionId::from("old2"), &payload(&[("k", "2")])).await.unwrap();
        keeping.save(&SessionId::from("live"), &payload(&[("k", "3")])).await.unwrap();
        std::fs::write(dir.path().join("README"), b"not a session").unwrap();
        std::fs::write(dir.path().join("sess_broken.json"), b"garbage").unwrap();

        let purged = keeping.purge_expired().await.unwrap();

        assert_eq!(purged, 2);
        assert!(keeping.exists(&SessionId::from("live")).await.unwrap());
        assert!(dir.path().join("README").exists());
        assert!(dir.path().join("sess_broken.json").exists());
    }
}
