//! Protocol codec
//!
//! Reading and writing the line-oriented wire format.
//!
//! ## Wire Format
//! ```text
//! client: <command line>\n
//! daemon: OK: <N>\n <line 1>\n ... <line N>\n
//!     or: <error line>\n
//! ```
//!
//! There is no framing beyond line counting: the status line declares how
//! many payload lines follow, and exactly that many are read.

use std::io::{BufRead, Read, Write};

use crate::error::{ClientError, Result};

use super::response::error_code;
use super::{Command, Response, Status};

/// Prefix of a successful status line
pub const OK_PREFIX: &str = "OK: ";

/// Longest line accepted from the daemon (64 KiB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: command line + `\n`
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let line = command.to_line()?;
    let mut message = Vec::with_capacity(line.len() + 1);
    message.extend_from_slice(line.as_bytes());
    message.push(b'\n');
    Ok(message)
}

/// Write a command to a stream
///
/// The whole line goes out in one `write_all` so a command is never
/// interleaved with anything else.
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Response Encoding
// =============================================================================

/// Encode a successful reply: `OK: <n>` + n lines
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut message = format!("{}{}\n", OK_PREFIX, response.len());
    for line in response.lines() {
        message.push_str(line);
        message.push('\n');
    }
    message.into_bytes()
}

/// Encode an error reply: a single line
pub fn encode_error(status_line: &str) -> Vec<u8> {
    format!("{}\n", status_line).into_bytes()
}

/// Write a successful reply to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Stream-based Response Decoding
// =============================================================================

/// Read and parse one status line
///
/// Blocks until a full line is received.
pub fn read_status<R: BufRead>(reader: &mut R) -> Result<Status> {
    match read_line(reader)? {
        Some(line) => Status::parse(&line),
        None => Err(ClientError::ConnectionClosed),
    }
}

/// Read a complete reply from a stream
///
/// An error status line is returned as [`ClientError::Protocol`] without
/// reading anything past it.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let count = match read_status(reader)? {
        Status::Ok(count) => count,
        Status::Error(status_line) => {
            let code = error_code(&status_line).map(str::to_string);
            return Err(ClientError::Protocol { status_line, code });
        }
    };

    tracing::trace!("Status OK, {} payload lines follow", count);

    let mut lines = Vec::with_capacity(count.min(1024));
    for received in 0..count {
        match read_line(reader)? {
            Some(line) => lines.push(line.trim().to_string()),
            None => {
                return Err(ClientError::TruncatedResponse {
                    expected: count,
                    received,
                })
            }
        }
    }

    Ok(Response::new(lines))
}

/// Read one `\n`-terminated line, `None` on EOF before any byte
///
/// A final line without terminator is accepted. Invalid UTF-8 is replaced
/// rather than rejected.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let limit = MAX_LINE_LEN as u64 + 1;
    let n = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_LEN {
        return Err(ClientError::LineTooLong {
            prefix: String::from_utf8_lossy(&buf[..64]).into_owned(),
            limit: MAX_LINE_LEN,
        });
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
