//! Line protocol for the echo service.
//!
//! The exchange is line-oriented, newline-terminated text:
//!
//! ```text
//! Server → client on connect:  Echo Server 1.0\n
//! Client → server:             <line>\n
//! Server → client:             Echo: <line>\n
//! ```
//!
//! A blank line from the client ends the session; so does closing the
//! connection. Lines are handled as raw bytes: the payload is echoed
//! byte-for-byte, whitespace and all, whether or not it is valid UTF-8.

use bytes::BytesMut;

/// Greeting written to every client immediately after connect.
pub const GREETING: &[u8] = b"Echo Server 1.0\n";

/// Prefix prepended to every echoed line.
pub const ECHO_PREFIX: &[u8] = b"Echo: ";

/// A single client line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// Non-empty payload to echo back, terminator stripped.
    Message(&'a [u8]),
    /// Blank line: the client is done with the session.
    End,
}

/// Classify one raw line as read off the wire.
///
/// Strips one trailing `\n` and, if present, the `\r` before it. A line
/// that arrives without a terminator (EOF mid-line) is classified as-is.
pub fn parse_line(raw: &[u8]) -> Request<'_> {
    let payload = strip_terminator(raw);
    if payload.is_empty() {
        Request::End
    } else {
        Request::Message(payload)
    }
}

/// Build the echo response for a message payload.
pub fn echo_line(msg: &[u8]) -> BytesMut {
    let mut line = BytesMut::with_capacity(ECHO_PREFIX.len() + msg.len() + 1);
    line.extend_from_slice(ECHO_PREFIX);
    line.extend_from_slice(msg);
    line.extend_from_slice(b"\n");
    line
}

/// Strip the line terminator: one `\n`, preceded by an optional `\r`.
fn strip_terminator(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}
