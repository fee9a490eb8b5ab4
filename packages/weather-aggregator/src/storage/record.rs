//! A single station's durable entry: body, metadata, and the persistence
//! logic that keeps the in-memory state and the on-disk file moving
//! together.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Metadata persisted alongside a station's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistMeta {
    lamport: u64,
    #[serde(rename = "lastUpdated")]
    last_updated: i64,
    #[serde(rename = "updateCount")]
    update_count: u64,
    host: String,
    port: u16,
}

/// The on-disk document shape: `{"meta": {...}, "body": <raw station JSON>}`.
#[derive(Serialize)]
struct PersistDocOut<'a> {
    meta: PersistMeta,
    body: &'a RawValue,
}

#[derive(Deserialize)]
struct PersistDocIn {
    meta: PersistMeta,
    body: Box<RawValue>,
}

/// Guarded, mutable part of a [`Record`]. Readers take the shared lock;
/// `merge` and `delete` take the exclusive lock.
#[derive(Debug, Clone, Default)]
struct RecordState {
    body: String,
    lamport: u64,
    last_updated: i64,
    global_seq: u64,
    origin_host: String,
    origin_port: u16,
}

/// An immutable snapshot of a [`Record`]'s fields, safe to hand to a reader
/// after the lock is released.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    pub body: String,
    pub lamport: u64,
    pub last_updated: i64,
    pub global_seq: u64,
    pub origin_host: String,
    pub origin_port: u16,
}

/// One station's canonical entry: body payload, write metadata, and the
/// reader/writer lock guarding both. The disk write-then-rename in
/// [`Record::merge`] happens while the exclusive lock is held, so a
/// concurrent reader never observes a transient temp-file state and a
/// second writer can never interleave with the first between write-temp
/// and rename.
#[derive(Debug)]
pub struct Record {
    id: String,
    dir: PathBuf,
    state: RwLock<RecordState>,
    /// Bumped on every successful merge; purely diagnostic (logged on
    /// eviction), never read back.
    merges: AtomicU64,
}

impl Record {
    /// Creates a blank record for `id`, backed by `<dir>/<id>.json`.
    #[must_use]
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
            state: RwLock::new(RecordState::default()),
            merges: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.id))
    }

    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}-temp.json", self.id))
    }

    /// Reads the current body and metadata under the shared lock.
    pub async fn snapshot(&self) -> RecordSnapshot {
        let state = self.state.read().await;
        RecordSnapshot {
            body: state.body.clone(),
            lamport: state.lamport,
            last_updated: state.last_updated,
            global_seq: state.global_seq,
            origin_host: state.origin_host.clone(),
            origin_port: state.origin_port,
        }
    }

    /// True if this record has ever had a write admitted (distinguishes a
    /// freshly created blank record from one with real data, for GET).
    pub async fn has_body(&self) -> bool {
        !self.state.read().await.body.is_empty()
    }

    /// Last-writer-wins merge keyed on Lamport timestamp.
    ///
    /// Acquires the exclusive lock; if `new_lamport` does not strictly
    /// exceed the stored value, returns `false` without any effect
    /// (equality is a no-op, per spec). On a higher Lamport, writes
    /// `<id>-temp.json`, renames it over `<id>.json`, and only then updates
    /// the in-memory fields. A write or rename failure leaves the
    /// in-memory state untouched and returns `false`; `last_updated` is
    /// always taken from `now`, never the incoming payload.
    pub async fn merge(
        &self,
        new_body: &str,
        new_lamport: u64,
        now_millis: i64,
        new_seq: u64,
        host: &str,
        port: u16,
    ) -> bool {
        let mut state = self.state.write().await;
        if new_lamport <= state.lamport {
            return false;
        }

        let raw_body = match RawValue::from_string(new_body.to_string()) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(id = %self.id, %error, "body is not valid JSON at merge time");
                return false;
            }
        };
        let doc = PersistDocOut {
            meta: PersistMeta {
                lamport: new_lamport,
                last_updated: now_millis,
                update_count: new_seq,
                host: host.to_string(),
                port,
            },
            body: &raw_body,
        };
        let text = match serde_json::to_string(&doc) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(id = %self.id, %error, "failed to serialize record document");
                return false;
            }
        };

        if let Err(error) = self.write_temp_synced(text.as_bytes()).await {
            tracing::warn!(id = %self.id, %error, "failed to write temp record file");
            return false;
        }
        if let Err(error) = tokio::fs::rename(self.temp_path(), self.path()).await {
            tracing::warn!(id = %self.id, %error, "failed to rename temp record file into place");
            return false;
        }

        state.body = new_body.to_string();
        state.lamport = new_lamport;
        state.last_updated = now_millis;
        state.global_seq = new_seq;
        state.origin_host = host.to_string();
        state.origin_port = port;
        self.merges.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Loads `<id>.json` from disk. On any I/O or parse failure the record
    /// is left blank and the failure is logged, never propagated -- a
    /// missing or corrupt file at bootstrap is not fatal.
    pub async fn load(&self) {
        let path = self.path();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(id = %self.id, path = %path.display(), %error, "failed to read record file");
                return;
            }
        };
        let doc: PersistDocIn = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(error) => {
                tracing::warn!(id = %self.id, path = %path.display(), %error, "failed to parse record file");
                return;
            }
        };

        let mut state = self.state.write().await;
        state.body = doc.body.get().to_string();
        state.lamport = doc.meta.lamport;
        state.last_updated = doc.meta.last_updated;
        state.global_seq = doc.meta.update_count;
        state.origin_host = doc.meta.host;
        state.origin_port = doc.meta.port;
    }

    /// `now - last_updated > max_age_ms`, or
    /// `current_global_seq - global_seq > max_seq_gap`. Evaluated under the
    /// shared lock.
    pub async fn is_expired(
        &self,
        current_global_seq: u64,
        max_age_ms: i64,
        max_seq_gap: u64,
        now_millis: i64,
    ) -> bool {
        let state = self.state.read().await;
        let age = now_millis.saturating_sub(state.last_updated);
        let seq_gap = current_global_seq.saturating_sub(state.global_seq);
        age > max_age_ms || seq_gap > max_seq_gap
    }

    /// Removes `<id>.json` if present. A leftover temp file is left for a
    /// later write or cleanup sweep to deal with; its presence is not
    /// treated as a fatal condition.
    pub async fn delete(&self) {
        self.remove_file().await;
    }

    /// Whether `(host, port)` matches this record's last writer, checked
    /// under the shared lock. For anything that acts on the result (cleanup,
    /// eviction) use [`Record::delete_if_origin`] instead: checking here and
    /// deleting separately leaves a window for a concurrent merge to land
    /// between the two and have its write wiped out from under it.
    pub async fn origin_matches(&self, host: &str, port: u16) -> bool {
        let state = self.state.read().await;
        state.origin_host == host && state.origin_port == port
    }

    /// Atomically checks `(host, port)` against this record's current origin
    /// and deletes the file if it matches, all under one held exclusive
    /// lock. This is what connection-close cleanup must call instead of
    /// `origin_matches` + `delete`: holding the lock across both steps means
    /// a `merge` that lands after the check was taken can never be observed
    /// as a stale match and then have its freshly-written file deleted out
    /// from under it.
    pub async fn delete_if_origin(&self, host: &str, port: u16) -> bool {
        let state = self.state.write().await;
        if state.origin_host != host || state.origin_port != port {
            return false;
        }
        self.remove_file().await;
        true
    }

    /// Atomically checks the expiry predicate and deletes the file if it
    /// holds, all under one held exclusive lock, for the same reason as
    /// [`Record::delete_if_origin`]: a sweep that merely checked `is_expired`
    /// and then deleted separately could wipe a merge that landed in
    /// between and made the record fresh again.
    pub async fn delete_if_expired(
        &self,
        current_global_seq: u64,
        max_age_ms: i64,
        max_seq_gap: u64,
        now_millis: i64,
    ) -> bool {
        let state = self.state.write().await;
        let age = now_millis.saturating_sub(state.last_updated);
        let seq_gap = current_global_seq.saturating_sub(state.global_seq);
        if age <= max_age_ms && seq_gap <= max_seq_gap {
            return false;
        }
        self.remove_file().await;
        true
    }

    /// Writes `bytes` to `<id>-temp.json` and `sync_all`s it before
    /// returning, so the rename that follows is never observed pointing at
    /// data the filesystem hasn't actually flushed to disk yet.
    async fn write_temp_synced(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(self.temp_path()).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn remove_file(&self) {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(id = %self.id, %error, "failed to delete record file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn record_in(dir: &Path, id: &str) -> Record {
        Record::new(id, dir.to_path_buf())
    }

    #[tokio::test]
    async fn merge_rejects_equal_or_lower_lamport() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        assert!(record.merge("{\"id\":\"S1\"}", 5, 1000, 1, "h", 1).await);
        assert!(!record.merge("{\"id\":\"S1\",\"x\":1}", 5, 2000, 2, "h", 1).await);
        assert!(!record.merge("{\"id\":\"S1\",\"x\":1}", 4, 2000, 2, "h", 1).await);
        let snap = record.snapshot().await;
        assert_eq!(snap.lamport, 5);
        assert_eq!(snap.body, "{\"id\":\"S1\"}");
    }

    #[tokio::test]
    async fn merge_accepts_strictly_higher_lamport() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        assert!(record.merge("{\"id\":\"S1\",\"v\":1}", 1, 100, 1, "h", 1).await);
        assert!(record.merge("{\"id\":\"S1\",\"v\":2}", 2, 200, 2, "h", 1).await);
        let snap = record.snapshot().await;
        assert_eq!(snap.body, "{\"id\":\"S1\",\"v\":2}");
        assert_eq!(snap.last_updated, 200);
    }

    #[tokio::test]
    async fn merge_persists_atomically_and_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\",\"humidity\":\"55\"}", 3, 42, 9, "127.0.0.1", 4000).await;
        assert!(record.path().exists());
        assert!(!record.temp_path().exists());

        let reloaded = record_in(dir.path(), "S1").await;
        reloaded.load().await;
        let snap = reloaded.snapshot().await;
        assert_eq!(snap.lamport, 3);
        assert_eq!(snap.global_seq, 9);
        assert_eq!(snap.origin_host, "127.0.0.1");
        assert_eq!(snap.origin_port, 4000);
        assert!(snap.body.contains("humidity"));
    }

    #[tokio::test]
    async fn load_missing_file_leaves_blank_state() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "GONE").await;
        record.load().await;
        let snap = record.snapshot().await;
        assert_eq!(snap.lamport, 0);
        assert_eq!(snap.body, "");
    }

    #[tokio::test]
    async fn is_expired_by_age_or_seq_gap() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\"}", 1, 0, 5, "h", 1).await;

        assert!(!record.is_expired(5, 30_000, 20, 0).await);
        assert!(record.is_expired(5, 30_000, 20, 30_001).await);
        assert!(record.is_expired(26, 30_000, 20, 0).await);
        assert!(!record.is_expired(25, 30_000, 20, 0).await);
    }

    #[tokio::test]
    async fn delete_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\"}", 1, 0, 1, "h", 1).await;
        assert!(record.path().exists());
        record.delete().await;
        assert!(!record.path().exists());
        record.delete().await;
    }

    #[tokio::test]
    async fn origin_matches_checks_host_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\"}", 1, 0, 1, "10.0.0.1", 9000).await;
        assert!(record.origin_matches("10.0.0.1", 9000).await);
        assert!(!record.origin_matches("10.0.0.1", 9001).await);
        assert!(!record.origin_matches("10.0.0.2", 9000).await);
    }

    #[tokio::test]
    async fn delete_if_origin_refuses_a_later_writer() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\"}", 1, 0, 1, "A", 1).await;
        // A later writer overtakes before A's cleanup runs.
        record.merge("{\"id\":\"S1\",\"v\":2}", 2, 100, 2, "B", 2).await;

        assert!(!record.delete_if_origin("A", 1).await);
        assert!(record.path().exists());

        assert!(record.delete_if_origin("B", 2).await);
        assert!(!record.path().exists());
    }

    #[tokio::test]
    async fn delete_if_expired_refuses_a_record_made_fresh_since_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_in(dir.path(), "S1").await;
        record.merge("{\"id\":\"S1\"}", 1, 0, 1, "h", 1).await;
        assert!(record.is_expired(30, 30_000, 20, 0).await);

        // A merge lands between an observer's `is_expired` check and its
        // delete, making the record fresh again.
        record.merge("{\"id\":\"S1\",\"v\":2}", 2, 0, 29, "h", 1).await;

        assert!(!record.delete_if_expired(30, 30_000, 20, 0).await);
        assert!(record.path().exists());
    }
}
