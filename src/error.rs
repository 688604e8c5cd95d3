//! Error types for vpnd-client
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Unified error type for control channel operations
#[derive(Debug, Error)]
pub enum ClientError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Unable to connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The daemon answered with something other than `OK: <n>`.
    ///
    /// This is fatal for the session: no payload is read and the client
    /// refuses further commands.
    #[error("Daemon returned error: {status_line}")]
    Protocol {
        status_line: String,
        code: Option<String>,
    },

    #[error("Malformed status line: {0:?}")]
    MalformedStatus(String),

    #[error("Connection closed by daemon before status line")]
    ConnectionClosed,

    #[error("Truncated response: expected {expected} payload lines, got {received}")]
    TruncatedResponse { expected: usize, received: usize },

    /// A reply line longer than the codec accepts; the rest of the line
    /// is still on the wire, so the stream is out of step.
    #[error("Reply line exceeds {limit} bytes: {prefix:?}...")]
    LineTooLong { prefix: String, limit: usize },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid payload line {line:?}: {reason}")]
    InvalidPayload { line: String, reason: String },

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Session aborted after daemon error: {0}")]
    SessionFailed(String),

    #[error("Session already closed with QUIT")]
    SessionClosed,

    // -------------------------------------------------------------------------
    // Script / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Script error on line {line}: {reason}")]
    Script { line: usize, reason: String },

    /// A script built from commands rather than text; `index` is 0-based
    #[error("Invalid script at command {index}: {reason}")]
    InvalidScript { index: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether this error ends the session for good.
    ///
    /// Callers running a command sequence must stop at the first fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol { .. }
                | ClientError::MalformedStatus(_)
                | ClientError::ConnectionClosed
                | ClientError::TruncatedResponse { .. }
                | ClientError::LineTooLong { .. }
                | ClientError::SessionFailed(_)
                | ClientError::SessionClosed
                | ClientError::Io(_)
        )
    }

    /// The raw status line for daemon-reported errors.
    pub fn status_line(&self) -> Option<&str> {
        match self {
            ClientError::Protocol { status_line, .. } => Some(status_line),
            _ => None,
        }
    }
}
