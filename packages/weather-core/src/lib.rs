//! Weather aggregation core -- wire framing, HTTP-shaped request/response
//! parsing, and the process-wide Lamport clock shared by the Aggregator.
//!
//! This crate is deliberately independent of any single role (Aggregator,
//! Feeder, Reader): it only knows how to read and write frames and how to
//! keep a Lamport clock. The Aggregator is the only role built out in this
//! workspace; Feeders and Readers are external collaborators described by
//! the wire contract these types implement.

pub mod clock;
pub mod error;
pub mod wire;

pub use clock::Clock;
pub use error::{FrameError, ParseError};
pub use wire::{parse_request, read_frame, write_frame, Method, Request, Response};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
