//! Top-level error type for failures that can abort the Aggregator process
//! itself, as opposed to per-request protocol errors (which are always
//! turned into a response, never an `Err` -- see [`network::handler`]).
//!
//! [`network::handler`]: crate::network::handler

/// Fatal startup or lifecycle failure.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// The configured port could not be bound.
    #[error("failed to bind TCP listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    /// The data directory could not be scanned at bootstrap.
    #[error("failed to read data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
