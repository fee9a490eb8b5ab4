//! Per-station durable storage: [`Record`] (body, metadata, persistence) and
//! [`RecordStore`] (the concurrent map from station id to `Record`).

pub mod record;
pub mod store;

pub use record::{Record, RecordSnapshot};
pub use store::RecordStore;
