//! Process-wide mapping from station id to [`Record`], with at-most-one
//! record per id and fine-grained per-record locking.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::record::Record;

/// Concurrent map from station id to [`Record`].
///
/// Backed by [`DashMap`] for lock-free concurrent insertion and lookup,
/// mirroring the teacher's `HashMapStorage` (sharded, no external locking
/// needed for map-level operations); per-record mutation is guarded by each
/// [`Record`]'s own lock, not the map's.
#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    records: DashMap<String, Arc<Record>>,
}

impl RecordStore {
    /// Creates an empty store persisting records under `dir`.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            records: DashMap::new(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Inserts a fresh record only if `id` is absent, returning the record
    /// now bound in the map and whether this call created it. Concurrent
    /// first-writers for the same id race on the map's shard lock; exactly
    /// one observes `created = true`.
    pub fn get_or_create(&self, id: &str) -> (Arc<Record>, bool) {
        match self.records.entry(id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let record = Arc::new(Record::new(id, self.dir.clone()));
                entry.insert(Arc::clone(&record));
                (record, true)
            }
        }
    }

    /// Lookup without creation.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Record>> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes the binding for `id` only if it is currently bound to
    /// exactly `record` (pointer identity), so a stale cleaner can never
    /// erase a reinsertion that raced ahead of it.
    pub fn remove_if_same(&self, id: &str, record: &Arc<Record>) -> bool {
        match self.records.entry(id.to_string()) {
            Entry::Occupied(entry) if Arc::ptr_eq(entry.get(), record) => {
                entry.remove();
                true
            }
            _ => false,
        }
    }

    /// Inserts `record` unconditionally, used only by bootstrap to seed the
    /// store from disk before any concurrent access is possible.
    pub fn insert_loaded(&self, id: String, record: Arc<Record>) {
        self.records.insert(id, record);
    }

    /// Concurrent-safe snapshot of all currently-bound records. May miss
    /// entries inserted during the call and may include entries concurrently
    /// being removed; never panics on either.
    #[must_use]
    pub fn iter(&self) -> Vec<Arc<Record>> {
        self.records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
