//! Weather Aggregator -- the central node in the weather station cluster.
//!
//! Holds the authoritative, last-writer-wins record for every weather
//! station id, durable across restarts, reachable over a small
//! length-prefixed TCP protocol (see [`weather_core`]). A single process
//! clock ([`weather_core::Clock`]) orders every request and versions every
//! write; a background sweep ([`expiry`]) evicts records that have gone
//! stale either by age or by falling too far behind the cluster's write
//! traffic.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod expiry;
pub mod network;
pub mod shutdown;
pub mod storage;

pub use config::{Args, ExpiryPolicy};
pub use error::AggregatorError;
pub use storage::{Record, RecordStore};
