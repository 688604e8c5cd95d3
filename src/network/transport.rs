//! Transport
//!
//! Opens the byte stream to the daemon: plain TCP, or TCP wrapped in
//! mutually authenticated TLS.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{ClientConfig, TransportConfig};
use crate::error::{ClientError, Result};

use super::tls::{self, TlsStream};

/// An open connection to the daemon
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl Transport {
    fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => &stream.sock,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Set the read timeout (`None` blocks forever)
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp().set_read_timeout(timeout)
    }

    /// Close the connection, sending close_notify first on TLS
    pub fn shutdown(&mut self) -> io::Result<()> {
        if let Transport::Tls(stream) = self {
            stream.conn.send_close_notify();
            stream.flush()?;
        }
        match self.tcp().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

/// Connect to the daemon described by `config`
///
/// Fails with [`ClientError::Connection`] when no resolved address accepts
/// within the connect deadline, and with [`ClientError::TlsHandshake`] when
/// the TLS variant cannot verify the daemon (or is refused by it).
pub fn connect(config: &ClientConfig) -> Result<Transport> {
    let tcp = connect_tcp(config)?;
    tcp.set_read_timeout(config.read_timeout)?;

    match &config.transport {
        TransportConfig::Plain => Ok(Transport::Plain(tcp)),
        TransportConfig::Tls(options) => {
            let stream = tls::handshake(options, tcp)?;
            Ok(Transport::Tls(Box::new(stream)))
        }
    }
}

fn connect_tcp(config: &ClientConfig) -> Result<TcpStream> {
    let endpoint = config.endpoint();
    let host = config.host.trim_start_matches('[').trim_end_matches(']');

    let addrs: Vec<SocketAddr> = (host, config.port)
        .to_socket_addrs()
        .map_err(|source| ClientError::Connection {
            endpoint: endpoint.clone(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                // Commands are single small writes, don't let Nagle hold them
                stream.set_nodelay(true)?;
                tracing::debug!("Connected to {} ({})", endpoint, addr);
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(ClientError::Connection {
        endpoint,
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }),
    })
}
