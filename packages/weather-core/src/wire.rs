//! Length-prefixed framing and HTTP-shaped request/response text.
//!
//! Each TCP message is a 16-bit big-endian byte length followed by exactly
//! that many UTF-8 bytes: `METHOD SP target SP HTTP/1.1 CRLF` (or
//! `HTTP/1.1 SP code SP reason CRLF` for a response), header lines, a blank
//! line, then the body. The format is HTTP-shaped, not HTTP/1.1-conformant:
//! no transfer-encoding, no chunking, `Content-Length` is informational only.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FrameError, ParseError};

const MAX_FRAME_LEN: usize = u16::MAX as usize;
const LAMPORT_HEADER: &str = "Lamport-Clock";

/// One of the three recognised request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Sync,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Sync => "SYNC",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "SYNC" => Ok(Method::Sync),
            other => Err(ParseError::UnknownMethod(other.to_string())),
        }
    }
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    /// Looks up a header by name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the parsed `Lamport-Clock` header, if present and a valid
    /// non-negative integer.
    #[must_use]
    pub fn lamport(&self) -> Option<u64> {
        self.header(LAMPORT_HEADER)?.trim().parse().ok()
    }
}

/// Parses the UTF-8 text of one frame into a [`Request`].
///
/// # Errors
///
/// Returns [`ParseError`] on invalid UTF-8, a malformed start line, an
/// unrecognized method, or a header line without a `: ` separator.
pub fn parse_request(bytes: &[u8]) -> Result<Request, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)?;
    let mut lines = text.split("\r\n");

    let start_line = lines.next().unwrap_or_default();
    let mut parts = start_line.splitn(3, ' ');
    let (Some(method_tok), Some(target), Some(_version)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::MalformedStartLine(start_line.to_string()));
    };
    let method: Method = method_tok.parse()?;

    let mut headers = Vec::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_body = false;
    for line in lines {
        if in_body {
            body_lines.push(line);
            continue;
        }
        if line.is_empty() {
            in_body = true;
            continue;
        }
        let Some((name, value)) = line.split_once(": ") else {
            return Err(ParseError::MalformedHeader(line.to_string()));
        };
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(Request {
        method,
        target: target.to_string(),
        headers,
        body: body_lines.join("\r\n"),
    })
}

/// An outbound response, built by a connection handler and framed for the
/// wire by [`Response::into_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl Response {
    /// Looks up a header by name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Builds a response with no body, stamping the `Lamport-Clock` header
    /// with the server's clock value *after* processing this request.
    #[must_use]
    pub fn empty(status: u16, lamport: u64) -> Self {
        Self {
            status,
            headers: vec![(LAMPORT_HEADER.to_string(), lamport.to_string())],
            body: String::new(),
        }
    }

    /// Builds a response carrying `body`, with `Content-Length` set
    /// informationally (the wire format carries no chunking, so it is not
    /// load-bearing for framing).
    #[must_use]
    pub fn with_body(status: u16, lamport: u64, body: String) -> Self {
        Self {
            headers: vec![
                (LAMPORT_HEADER.to_string(), lamport.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            status,
            body,
        }
    }

    /// Serializes the response into the HTTP-shaped text the wire format
    /// specifies.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }
}

/// Reads one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before
/// sending any bytes of a new frame -- the caller should treat this as
/// connection-close, not as an error. A partial length prefix or a close
/// mid-body is a [`FrameError::Truncated`].
///
/// # Errors
///
/// Returns [`FrameError`] on a truncated frame or underlying I/O failure.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len_buf = [0u8; 2];
    match read_exact_or_eof(reader, &mut len_buf).await? {
        0 => return Ok(None),
        n if n < len_buf.len() => {
            return Err(FrameError::Truncated {
                expected: len_buf.len(),
                got: n,
            })
        }
        _ => {}
    }

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    let got = read_exact_or_eof(reader, &mut body).await?;
    if got < len {
        return Err(FrameError::Truncated { expected: len, got });
    }
    Ok(Some(body))
}

/// Writes one length-prefixed frame and flushes the stream.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if `bytes` exceeds 65535 bytes, or
/// [`FrameError::Io`] on a write failure.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), FrameError> {
    if bytes.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(bytes.len()));
    }
    let len = u16::try_from(bytes.len()).expect("checked above").to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads into `buf` until full or EOF, returning the number of bytes read
/// (which may be less than `buf.len()` only on a clean or mid-read EOF).
async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_with_headers() {
        let raw = b"GET /S1 HTTP/1.1\r\nLamport-Clock: 3\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target, "/S1");
        assert_eq!(req.lamport(), Some(3));
        assert_eq!(req.body, "");
    }

    #[test]
    fn parses_put_with_body() {
        let raw = b"PUT /weather.json HTTP/1.1\r\nLamport-Clock: 2\r\n\r\n{\"id\":\"S1\"}";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.body, "{\"id\":\"S1\"}");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let raw = b"SYNC / HTTP/1.1\r\nlamport-clock: 7\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.lamport(), Some(7));
    }

    #[test]
    fn missing_lamport_header_is_none() {
        let raw = b"GET /S1 HTTP/1.1\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.lamport(), None);
    }

    #[test]
    fn non_integer_lamport_is_none() {
        let raw = b"GET /S1 HTTP/1.1\r\nLamport-Clock: abc\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.lamport(), None);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let raw = b"DELETE /S1 HTTP/1.1\r\n\r\n";
        assert!(matches!(
            parse_request(raw),
            Err(ParseError::UnknownMethod(_))
        ));
    }

    #[test]
    fn malformed_start_line_is_rejected() {
        let raw = b"garbage bytes";
        assert!(matches!(
            parse_request(raw),
            Err(ParseError::MalformedStartLine(_))
        ));
    }

    #[test]
    fn response_roundtrip_shape() {
        let resp = Response::with_body(200, 5, "[]".to_string());
        let bytes = resp.into_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Lamport-Clock: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n[]"));
    }

    #[tokio::test]
    async fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn clean_close_before_frame_is_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let frame = read_frame(&mut cursor).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn truncated_length_prefix_is_an_error() {
        let mut cursor = std::io::Cursor::new(vec![0u8]);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));
    }
}
