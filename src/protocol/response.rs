//! Response definitions
//!
//! Status lines, payloads and the `LIST` payload format.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{ClientError, Result};

use super::codec::OK_PREFIX;

/// Parsed status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `OK: <n>`, n payload lines follow
    Ok(usize),

    /// Any other line, kept verbatim (line terminator removed)
    Error(String),
}

impl Status {
    /// Parse a status line
    ///
    /// A line starting with `"OK: "` must carry a non-negative integer,
    /// otherwise it is malformed. Every other line is an error status.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        match line.strip_prefix(OK_PREFIX) {
            Some(count) => count
                .trim()
                .parse::<usize>()
                .map(Status::Ok)
                .map_err(|_| ClientError::MalformedStatus(line.to_string())),
            None => Ok(Status::Error(line.to_string())),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok(_))
    }

    /// The code of an `ERR: <CODE>` line
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Status::Error(line) => error_code(line),
            Status::Ok(_) => None,
        }
    }
}

/// A successful reply: the payload lines, trimmed, in receipt order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// An `OK: 0` reply
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Interpret the payload as a `LIST` reply
    pub fn connections(&self) -> Result<Vec<ConnectionInfo>> {
        self.lines.iter().map(|l| ConnectionInfo::parse(l)).collect()
    }

    /// Interpret the payload as a `DISCONNECT` reply
    ///
    /// The local-channel daemon answers with a single line holding the
    /// number of clients it disconnected; the management daemon answers
    /// `OK: 0`, which gives `None`.
    pub fn disconnected_count(&self) -> Result<Option<usize>> {
        match self.lines.as_slice() {
            [] => Ok(None),
            [count] => count
                .parse()
                .map(Some)
                .map_err(|_| payload_error(count, "expected a disconnect count")),
            [_, extra, ..] => Err(payload_error(extra, "expected a single count line")),
        }
    }
}

impl From<Vec<String>> for Response {
    fn from(lines: Vec<String>) -> Self {
        Self::new(lines)
    }
}

/// One connected VPN client, as reported by `LIST`
///
/// Wire form: `<common name> <ipv4> <ipv6>`. The daemon writes empty
/// fields when OpenVPN has no address of that family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub common_name: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl ConnectionInfo {
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(' ').collect();
        if fields.len() > 3 {
            return Err(payload_error(line, "expected at most 3 fields"));
        }
        let common_name = fields[0];
        if common_name.is_empty() {
            return Err(payload_error(line, "missing common name"));
        }

        let ipv4 = match fields.get(1).copied().filter(|f| !f.is_empty()) {
            Some(f) => Some(
                f.parse()
                    .map_err(|_| payload_error(line, "invalid IPv4 address"))?,
            ),
            None => None,
        };
        let ipv6 = match fields.get(2).copied().filter(|f| !f.is_empty()) {
            Some(f) => Some(
                f.parse()
                    .map_err(|_| payload_error(line, "invalid IPv6 address"))?,
            ),
            None => None,
        };

        Ok(Self {
            common_name: common_name.to_string(),
            ipv4,
            ipv6,
        })
    }
}

pub(super) fn error_code(status_line: &str) -> Option<&str> {
    status_line.strip_prefix("ERR: ").map(str::trim)
}

fn payload_error(line: &str, reason: &str) -> ClientError {
    ClientError::InvalidPayload {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}
