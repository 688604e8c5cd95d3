//! Mock daemon connection handler
//!
//! Handles one client connection: read a line, look up the reply for its
//! verb, write it, repeat until the client goes away or sends QUIT.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use rustls::{ServerConnection, StreamOwned};

use crate::protocol::{encode_error, encode_response, Response, Verb};

use super::daemon::{Reply, NOT_SUPPORTED};

/// State shared by every connection of one mock daemon
#[derive(Clone)]
pub(super) struct ConnectionContext {
    pub replies: Arc<Mutex<HashMap<String, Reply>>>,
    pub received: Sender<String>,
    pub handshake_failures: Arc<AtomicUsize>,
}

pub(super) fn serve_plain(stream: TcpStream, peer: SocketAddr, context: ConnectionContext) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("set_nodelay failed for {}: {}", peer, e);
    }
    handle(stream, peer, &context);
}

pub(super) fn serve_tls(
    mut tcp: TcpStream,
    peer: SocketAddr,
    config: Arc<rustls::ServerConfig>,
    context: ConnectionContext,
) {
    let mut conn = match ServerConnection::new(config) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Unable to start TLS for {}: {}", peer, e);
            return;
        }
    };

    while conn.is_handshaking() {
        if let Err(e) = conn.complete_io(&mut tcp) {
            tracing::debug!("TLS handshake with {} failed: {}", peer, e);
            context.handshake_failures.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    let mut stream = StreamOwned::new(conn, tcp);
    if handle(&mut stream, peer, &context) {
        stream.conn.send_close_notify();
        let _ = stream.flush();
    }
}

/// Serve commands until the client disconnects
///
/// Returns true when the session ended with QUIT.
fn handle<S: Read + Write>(stream: S, peer: SocketAddr, context: &ConnectionContext) -> bool {
    tracing::debug!("Mock connection established from {}", peer);
    let mut reader = BufReader::new(stream);

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("Client {} disconnected", peer);
                return false;
            }
            Ok(_) => {}
            Err(e) if is_disconnect(&e) => {
                tracing::debug!("Connection to {} ended: {}", peer, e);
                return false;
            }
            Err(e) => {
                // A peer that failed client authentication in TLS 1.3 shows up here
                tracing::warn!("Error reading from {}: {}", peer, e);
                context.handshake_failures.fetch_add(1, Ordering::SeqCst);
                return false;
            }
        }

        let line = line.trim_end_matches(['\n', '\r']).to_string();
        let verb = line.split(' ').next().unwrap_or_default().to_string();
        tracing::trace!("Mock received from {}: {:?}", peer, line);

        // Report before answering so the client sees the reply only after
        // the line is observable
        let _ = context.received.send(line);

        let reply = context
            .replies
            .lock()
            .get(&verb)
            .cloned()
            .unwrap_or_else(|| Reply::Status(NOT_SUPPORTED.to_string()));

        let bytes = match reply {
            Reply::Ok(lines) => encode_response(&Response::new(lines)),
            Reply::Status(status_line) => encode_error(&status_line),
            Reply::Close => {
                tracing::debug!("Dropping {} on {:?}", peer, verb);
                return false;
            }
        };

        let writer = reader.get_mut();
        if let Err(e) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
            if !is_disconnect(&e) {
                tracing::warn!("Error writing to {}: {}", peer, e);
            }
            return false;
        }

        if verb == Verb::Quit.as_str() {
            tracing::debug!("Client {} sent QUIT", peer);
            return true;
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
