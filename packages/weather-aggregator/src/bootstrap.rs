//! Cold-start recovery: loads every persisted record from the data
//! directory and seeds the process clock from their high-water marks.

use std::path::Path;
use std::sync::Arc;

use weather_core::Clock;

use crate::error::AggregatorError;
use crate::storage::{Record, RecordStore};

/// Scans `store.data_dir()` for `<id>.json` files (ignoring `*-temp.json`
/// leftovers from an interrupted write), loads each into the store, and
/// returns a [`Clock`] initialized to the maximum `(lamport, update_count)`
/// observed across all of them -- so a restarted Aggregator never replays a
/// Lamport value or update sequence number it already handed out.
///
/// # Errors
///
/// Returns [`AggregatorError::DataDir`] if the directory cannot be read.
pub async fn run(store: &RecordStore) -> Result<Clock, AggregatorError> {
    let dir = store.data_dir().clone();
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|source| AggregatorError::DataDir { path: dir.clone(), source })?;

    let mut max_lamport = 0u64;
    let mut max_seq = 0u64;
    let mut loaded = 0usize;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| AggregatorError::DataDir { path: dir.clone(), source })?
    {
        let Some(id) = station_id(&entry.path()) else {
            continue;
        };

        let record = Arc::new(Record::new(id.clone(), dir.clone()));
        record.load().await;
        if !record.has_body().await {
            continue;
        }

        let snapshot = record.snapshot().await;
        max_lamport = max_lamport.max(snapshot.lamport);
        max_seq = max_seq.max(snapshot.global_seq);
        store.insert_loaded(id, record);
        loaded += 1;
    }

    tracing::info!(loaded, max_lamport, max_seq, "bootstrap complete");
    Ok(Clock::with_initial(max_lamport, max_seq))
}

/// Extracts the station id from a persisted record's file name, rejecting
/// `*-temp.json` leftovers and anything not ending in `.json`.
fn station_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".json")?;
    if stem.ends_with("-temp") {
        return None;
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn bootstrap_loads_records_and_seeds_clock_from_maxima() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(PathBuf::from(dir.path()));

        let seed_a = Record::new("S1", PathBuf::from(dir.path()));
        seed_a.merge("{\"id\":\"S1\"}", 5, 100, 3, "h", 1).await;
        let seed_b = Record::new("S2", PathBuf::from(dir.path()));
        seed_b.merge("{\"id\":\"S2\"}", 9, 100, 7, "h", 1).await;

        let clock = run(&store).await.unwrap();
        assert_eq!(clock.lamport(), 9);
        assert_eq!(clock.update_count(), 7);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_ignores_temp_files_and_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("S1-temp.json"), b"{}").await.unwrap();
        let store = RecordStore::new(PathBuf::from(dir.path()));

        let clock = run(&store).await.unwrap();
        assert_eq!(clock.lamport(), 0);
        assert!(store.is_empty());
    }
}
