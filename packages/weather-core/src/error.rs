//! Error types for frame and request/response (de)serialization.
//!
//! These never escape a connection handler as a hard failure -- per the
//! protocol's error handling design, an unparseable frame still produces a
//! well-formed 400 response. They exist so the parsing layer stays a pure
//! function from bytes to `Result`, with disposition decided by the caller.

/// Failure to decode a length-prefixed frame into bytes.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The 16-bit length prefix was announced but the stream closed before
    /// the full frame arrived.
    #[error("connection closed mid-frame: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes announced by the length prefix.
        expected: usize,
        /// Bytes actually read before the stream closed.
        got: usize,
    },
    /// A frame body exceeds the 16-bit length prefix's range.
    #[error("frame of {0} bytes exceeds the 65535-byte wire limit")]
    TooLarge(usize),
    /// Underlying socket I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to parse a framed message's HTTP-shaped text into a [`Request`].
///
/// [`Request`]: crate::wire::Request
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The frame is not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    /// The start line is missing, or does not have exactly three
    /// space-separated parts.
    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),
    /// The method token is not one of `GET`, `PUT`, `SYNC`.
    #[error("unrecognized method: {0:?}")]
    UnknownMethod(String),
    /// A header line has no `: ` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
}
