//! Background sweep that evicts records past the configured age or
//! update-sequence threshold.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::ExpiryPolicy;
use crate::storage::RecordStore;
use weather_core::Clock;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Runs forever, sweeping the store every `policy.sweep_interval_ms` until
/// `shutdown` fires. Each expired record's file is deleted and its binding
/// removed from the store by identity, so a record reinserted between the
/// expiry check and the delete is never lost.
pub async fn run(store: Arc<RecordStore>, clock: Arc<Clock>, policy: ExpiryPolicy, shutdown: Arc<tokio::sync::Notify>) {
    let interval = Duration::from_millis(policy.sweep_interval_ms);
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {
                sweep_once(&store, &clock, &policy).await;
            }
            () = shutdown.notified() => {
                tracing::info!("expiry sweep shutting down");
                break;
            }
        }
    }
}

async fn sweep_once(store: &RecordStore, clock: &Clock, policy: &ExpiryPolicy) {
    let global_seq = clock.update_count();
    let now = now_millis();
    let mut evicted = 0usize;
    for record in store.iter() {
        let deleted = record
            .delete_if_expired(global_seq, policy.max_age_ms, policy.max_seq_gap, now)
            .await;
        if deleted && store.remove_if_same(record.id(), &record) {
            evicted += 1;
        }
    }
    if evicted > 0 {
        tracing::info!(evicted, "expiry sweep evicted records");
    }
}
