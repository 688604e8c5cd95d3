//! Mock daemon
//!
//! Accepts connections on a loopback port and answers each command line
//! with a canned reply chosen by its verb.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use rustls::server::WebPkiClientVerifier;

use crate::config::{ClientConfig, TlsOptions};
use crate::error::{ClientError, Result};
use crate::network::tls;

use super::connection::{serve_plain, serve_tls, ConnectionContext};

/// Status line sent for verbs without a configured reply
pub const NOT_SUPPORTED: &str = "ERR: NOT_SUPPORTED";

/// How the mock answers a verb
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK: <n>` followed by the lines
    Ok(Vec<String>),

    /// A single status line, sent as-is
    Status(String),

    /// Drop the connection without answering
    Close,
}

impl Reply {
    pub fn ok<I, T>(lines: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Reply::Ok(lines.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Reply::Ok(Vec::new())
    }

    pub fn status(line: impl Into<String>) -> Self {
        Reply::Status(line.into())
    }
}

/// Server certificate for the TLS variant; client certificates are required
#[derive(Debug, Clone)]
pub struct ServerTls {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA that client certificates must chain to
    pub client_ca: PathBuf,
}

/// Builder for MockDaemon
pub struct MockDaemonBuilder {
    replies: HashMap<String, Reply>,
    tls: Option<ServerTls>,
}

impl Default for MockDaemonBuilder {
    /// Starts with `OK: 0` for SET_PORTS, LIST, DISCONNECT and QUIT
    fn default() -> Self {
        let replies = ["SET_PORTS", "LIST", "DISCONNECT", "QUIT"]
            .into_iter()
            .map(|verb| (verb.to_string(), Reply::empty()))
            .collect();
        Self { replies, tls: None }
    }
}

impl MockDaemonBuilder {
    /// Set the reply for a verb
    pub fn reply(mut self, verb: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(verb.into(), reply);
        self
    }

    /// Forget every configured reply; everything answers `ERR: NOT_SUPPORTED`
    pub fn without_defaults(mut self) -> Self {
        self.replies.clear();
        self
    }

    /// Serve TLS and require client certificates
    pub fn tls(mut self, tls: ServerTls) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Bind to `127.0.0.1:0` and start accepting
    pub fn start(self) -> Result<MockDaemon> {
        let tls_config = self.tls.as_ref().map(server_config).transpose()?;

        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let (sender, received) = channel::unbounded();
        let context = ConnectionContext {
            replies: Arc::new(Mutex::new(self.replies)),
            received: sender,
            handshake_failures: Arc::new(AtomicUsize::new(0)),
        };
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_thread = {
            let context = context.clone();
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name(format!("mock-daemon-{}", addr.port()))
                .spawn(move || accept_loop(listener, context, tls_config, shutdown))?
        };

        tracing::debug!("Mock daemon listening on {}", addr);

        Ok(MockDaemon {
            addr,
            context,
            received,
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }
}

/// A running mock daemon; stops accepting when dropped
pub struct MockDaemon {
    addr: SocketAddr,
    context: ConnectionContext,
    received: Receiver<String>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl MockDaemon {
    pub fn builder() -> MockDaemonBuilder {
        MockDaemonBuilder::default()
    }

    /// Start a plain TCP mock with the default replies
    pub fn start() -> Result<Self> {
        Self::builder().start()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A plain client config pointing at this daemon
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .host(self.addr.ip().to_string())
            .port(self.addr.port())
            .build()
    }

    /// A TLS client config pointing at this daemon
    pub fn tls_client_config(&self, options: TlsOptions) -> ClientConfig {
        ClientConfig::builder()
            .host(self.addr.ip().to_string())
            .port(self.addr.port())
            .tls(options)
            .build()
    }

    /// Change a reply while running
    pub fn set_reply(&self, verb: impl Into<String>, reply: Reply) {
        self.context.replies.lock().insert(verb.into(), reply);
    }

    /// Lines received so far (drains them)
    pub fn received(&self) -> Vec<String> {
        self.received.try_iter().collect()
    }

    /// Wait for the next received line
    pub fn next_received(&self, timeout: Duration) -> Option<String> {
        self.received.recv_timeout(timeout).ok()
    }

    /// TLS handshakes the daemon rejected or that broke off
    pub fn handshake_failures(&self) -> usize {
        self.context.handshake_failures.load(Ordering::SeqCst)
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    context: ConnectionContext,
    tls_config: Option<Arc<rustls::ServerConfig>>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
                continue;
            }
            Err(e) => {
                tracing::warn!("Mock daemon accept failed: {}", e);
                continue;
            }
        };

        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Unable to configure connection from {}: {}", peer, e);
            continue;
        }

        let context = context.clone();
        let tls_config = tls_config.clone();
        let spawned = thread::Builder::new()
            .name(format!("mock-conn-{}", peer.port()))
            .spawn(move || match tls_config {
                Some(config) => serve_tls(stream, peer, config, context),
                None => serve_plain(stream, peer, context),
            });
        if let Err(e) = spawned {
            tracing::warn!("Unable to spawn handler for {}: {}", peer, e);
        }
    }
}

/// Server side TLS config that requires a client certificate
fn server_config(options: &ServerTls) -> Result<Arc<rustls::ServerConfig>> {
    let provider = tls::crypto_provider();
    let roots = tls::load_roots(&options.client_ca)?;
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?;

    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(tls::load_certs(&options.cert)?, tls::load_key(&options.key)?)
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?;

    Ok(Arc::new(config))
}
