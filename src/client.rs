//! Client Module
//!
//! The control channel session: one connection, commands sent strictly
//! one after another.
//!
//! ## Session Lifecycle
//! ```text
//!   connect ──► Open ──(QUIT answered)──► Closed
//!                 │
//!                 └──(error status line / broken stream)──► Failed
//! ```
//!
//! A `Failed` session never touches the socket again: the first daemon
//! error stops the whole command sequence. The error is returned as a
//! value; escalating it (e.g. exiting the process) is up to the caller.

use std::io::{BufReader, Read, Write};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::network::{self, Transport};
use crate::protocol::{
    read_response, write_command, ClientEvent, Command, ConnectionInfo, Response, TrafficStats,
};

/// Where a session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Commands can be sent
    Open,

    /// QUIT was answered
    Closed,

    /// Aborted; holds the daemon's status line or the I/O failure
    Failed(String),
}

/// A session with the daemon
///
/// Generic over the stream so tests can drive it with in-memory pipes;
/// normally built with [`Client::connect`].
pub struct Client<S: Read + Write = Transport> {
    /// Buffered stream; writes go through `get_mut()`
    stream: BufReader<S>,

    /// Peer address for logging
    peer: String,

    state: SessionState,
}

impl Client<Transport> {
    /// Connect to the daemon described by `config`
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = network::connect(config)?;
        tracing::info!(
            "Connected to {}{}",
            config.endpoint(),
            if transport.is_tls() { " (TLS)" } else { "" }
        );
        Ok(Self::new(transport, config.endpoint()))
    }

    /// Close the socket without sending QUIT
    pub fn close(mut self) -> Result<()> {
        self.stream.get_mut().shutdown()?;
        Ok(())
    }
}

impl<S: Read + Write> Client<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer: peer.into(),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one command and wait for the complete reply
    ///
    /// An invalid command is rejected before anything is written and
    /// leaves the session usable. Anything that goes wrong on the wire,
    /// including an error status line, fails the session.
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        match &self.state {
            SessionState::Open => {}
            SessionState::Closed => return Err(ClientError::SessionClosed),
            SessionState::Failed(reason) => return Err(ClientError::SessionFailed(reason.clone())),
        }

        command.validate()?;
        tracing::debug!("-> {}: {}", self.peer, command);

        let result = write_command(self.stream.get_mut(), command)
            .and_then(|()| read_response(&mut self.stream));

        match result {
            Ok(response) => {
                tracing::debug!("<- {}: OK: {}", self.peer, response.len());
                for line in response.lines() {
                    tracing::trace!("<- {}: {}", self.peer, line);
                }
                if command.is_quit() {
                    self.state = SessionState::Closed;
                }
                Ok(response)
            }
            Err(e) => {
                let reason = match e.status_line() {
                    Some(status_line) => {
                        tracing::warn!("<- {}: {}", self.peer, status_line);
                        status_line.to_string()
                    }
                    None => {
                        tracing::warn!("Command {:?} to {} failed: {}", command.to_string(), self.peer, e);
                        e.to_string()
                    }
                };
                self.state = SessionState::Failed(reason);
                Err(e)
            }
        }
    }

    /// Send a line verbatim
    pub fn send_raw(&mut self, line: &str) -> Result<Response> {
        self.send(&Command::Raw(line.to_string()))
    }

    // -------------------------------------------------------------------------
    // Typed helpers
    // -------------------------------------------------------------------------

    /// `SET_PORTS`: the OpenVPN management ports the daemon should use
    pub fn set_ports(&mut self, ports: &[u16]) -> Result<()> {
        self.send(&Command::SetPorts {
            ports: ports.to_vec(),
        })?;
        Ok(())
    }

    /// `LIST`: currently connected VPN clients
    pub fn list(&mut self) -> Result<Vec<ConnectionInfo>> {
        self.send(&Command::List)?.connections()
    }

    /// `DISCONNECT`: kill clients by common name
    ///
    /// Returns how many clients were disconnected when the daemon reports
    /// it (see [`Response::disconnected_count`]).
    pub fn disconnect<T: AsRef<str>>(&mut self, common_names: &[T]) -> Result<Option<usize>> {
        self.send(&Command::Disconnect {
            common_names: common_names.iter().map(|cn| cn.as_ref().to_string()).collect(),
        })?
        .disconnected_count()
    }

    /// `SETUP`: register a common name for profiles
    pub fn setup<T: AsRef<str>>(&mut self, common_name: &str, profiles: &[T]) -> Result<Response> {
        self.send(&Command::Setup {
            common_name: common_name.to_string(),
            profiles: profiles.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// `CLIENT_CONNECT` (local channel)
    pub fn client_connect(&mut self, event: ClientEvent) -> Result<()> {
        self.send(&Command::ClientConnect(event))?;
        Ok(())
    }

    /// `CLIENT_DISCONNECT` (local channel)
    pub fn client_disconnect(&mut self, event: ClientEvent, stats: TrafficStats) -> Result<()> {
        self.send(&Command::ClientDisconnect { event, stats })?;
        Ok(())
    }

    /// `QUIT`: end the session
    ///
    /// Consumes the client, so nothing can be sent afterwards.
    pub fn quit(mut self) -> Result<()> {
        self.send(&Command::Quit)?;
        Ok(())
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
