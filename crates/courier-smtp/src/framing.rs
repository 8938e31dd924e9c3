//! Line framing shared by the client and the server session.
//!
//! SMTP is line based: every command, reply and DATA line ends in CRLF.
//! Lines are read with a length bound so a peer cannot exhaust memory.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Default maximum line length (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Outcome of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A complete line without its terminator. Invalid UTF-8 is replaced.
    Complete(String),
    /// The line exceeded the length bound. The rest of it is unread.
    TooLong,
    /// The peer closed the connection.
    Eof,
}

/// Reads one LF- or CRLF-terminated line.
///
/// A final unterminated line before EOF is returned as complete.
///
/// # Errors
///
/// Returns an error if the underlying read fails.
pub async fn read_line<R>(reader: &mut R, max_length: usize) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            if line.is_empty() {
                return Ok(Line::Eof);
            }
            break;
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > max_length {
            return Ok(Line::TooLong);
        }
    }

    if line.len() > max_length {
        return Ok(Line::TooLong);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    Ok(Line::Complete(match String::from_utf8(line) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }))
}
