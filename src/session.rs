//! Per-connection session: greeting, read/echo loop, teardown.
//!
//! Each accepted connection is owned by exactly one session task for its
//! entire lifetime. The session greets the client, echoes every non-empty
//! line back with an `Echo: ` prefix, and tears the connection down when
//! the client sends a blank line, closes its end, or an I/O error occurs.
//! A failure here never reaches the accept loop or any other session.

use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::protocol::{self, Request};

/// Initial line buffer capacity; the buffer grows for longer lines.
const LINE_CAPACITY: usize = 1024;

/// Run one connection to completion.
///
/// This is the task entry point: I/O errors are caught and logged here,
/// never surfaced to the accept loop.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr) {
    info!(peer = %peer, "Connection received");

    if let Err(e) = run_session(stream, peer).await {
        warn!(peer = %peer, error = %e, "Connection error");
    }

    info!(peer = %peer, "Connection closed");
}

/// The session loop.
///
/// Generic over the stream so the loop can be exercised against mock I/O
/// in tests; the server always hands it a `TcpStream`.
async fn run_session<S>(stream: S, peer: SocketAddr) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    // Greet the client before reading anything.
    writer.write_all(protocol::GREETING).await?;

    let mut line = Vec::with_capacity(LINE_CAPACITY);
    loop {
        line.clear();

        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            // EOF: the peer closed its end.
            break;
        }

        match protocol::parse_line(&line) {
            Request::End => break,
            Request::Message(msg) => {
                info!(peer = %peer, line = %String::from_utf8_lossy(msg), "Received line");
                writer.write_all(&protocol::echo_line(msg)).await?;
            }
        }
    }

    // Close both directions; the read half goes down with the session.
    writer.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn peer() -> SocketAddr {
        "127.0.0.1:49152".parse().unwrap()
    }

    #[tokio::test]
    async fn test_session_greets_then_echoes_until_blank_line() {
        let stream = Builder::new()
            .write(protocol::GREETING)
            .read(b"hello\n")
            .write(b"Echo: hello\n")
            .read(b"world\n")
            .write(b"Echo: world\n")
            .read(b"\n")
            .build();

        run_session(stream, peer()).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_ends_on_eof() {
        // No lines at all: the greeting goes out, then the peer is gone.
        let stream = Builder::new().write(protocol::GREETING).build();

        run_session(stream, peer()).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_echoes_crlf_lines_with_lf() {
        let stream = Builder::new()
            .write(protocol::GREETING)
            .read(b"hi\r\n")
            .write(b"Echo: hi\n")
            .read(b"\r\n")
            .build();

        run_session(stream, peer()).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_write_failure_ends_session() {
        let stream = Builder::new()
            .write(protocol::GREETING)
            .read(b"doomed\n")
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))
            .build();

        assert!(run_session(stream, peer()).await.is_err());
    }
}
