//! Configuration for vpnd-client
//!
//! Centralized configuration with sensible defaults, a builder, and an
//! optional TOML file.
//!
//! ## File Format
//! ```toml
//! host = "localhost"
//! port = 41194
//! connect_timeout_secs = 5
//!
//! [tls]
//! peer_name = "vpn-daemon"
//! ca_file = "ca.crt"
//! local_cert = "client/vpn-daemon-client.crt"
//! local_key = "client/vpn-daemon-client.key"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Default control channel port
pub const DEFAULT_PORT: u16 = 41194;

/// Default port of the daemon's local notification channel
pub const DEFAULT_LOCAL_PORT: u16 = 41195;

/// Default connect deadline
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Main configuration for a control channel client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Daemon host name or address
    pub host: String,

    /// Daemon port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Deadline for establishing the TCP connection
    pub connect_timeout: Duration,

    /// Read timeout for replies. `None` blocks until the daemon answers.
    pub read_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    pub transport: TransportConfig,
}

/// How the byte stream to the daemon is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Plain TCP
    Plain,

    /// TLS with a client certificate, server verified against `ca_file`
    Tls(TlsOptions),
}

/// Options for the mutually authenticated TLS transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsOptions {
    /// Name the server certificate must be valid for
    pub peer_name: String,

    /// PEM bundle of trusted issuers
    pub ca_file: PathBuf,

    /// PEM client certificate (chain)
    pub local_cert: PathBuf,

    /// PEM client private key
    pub local_key: PathBuf,
}

impl TlsOptions {
    fn resolve_relative_to(mut self, base: &Path) -> Self {
        for path in [&mut self.ca_file, &mut self.local_cert, &mut self.local_key] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            transport: TransportConfig::Plain,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Config for the daemon's unauthenticated loopback channel
    pub fn local() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_LOCAL_PORT,
            ..Self::default()
        }
    }

    /// `host:port` string used for connecting and logging
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Load a config from a TOML file
    ///
    /// Relative TLS paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("unable to read {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base)
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| ClientError::Config(e.to_string()))?;
        file.into_config(base_dir)
    }
}

/// On-disk representation; every field falls back to the default
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
    tls: Option<TlsOptions>,
}

impl ConfigFile {
    fn into_config(self, base_dir: &Path) -> Result<ClientConfig> {
        let mut builder = ClientConfig::builder();
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            if port == 0 {
                return Err(ClientError::Config("port must not be 0".to_string()));
            }
            builder = builder.port(port);
        }
        if let Some(secs) = self.connect_timeout_secs {
            if secs == 0 {
                return Err(ClientError::Config(
                    "connect_timeout_secs must not be 0".to_string(),
                ));
            }
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.read_timeout_secs {
            builder = builder.read_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(tls) = self.tls {
            builder = builder.tls(tls.resolve_relative_to(base_dir));
        }
        Ok(builder.build())
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    /// Start from an existing config (e.g. one loaded from a file)
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the daemon host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the daemon port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set (or clear) the reply read timeout
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Use the mutually authenticated TLS transport
    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.config.transport = TransportConfig::Tls(options);
        self
    }

    /// Use plain TCP
    pub fn plain(mut self) -> Self {
        self.config.transport = TransportConfig::Plain;
        self
    }

    /// Point at the loopback notification channel
    ///
    /// Host, port and transport switch to the local listener; timeouts
    /// are kept.
    pub fn local_channel(mut self) -> Self {
        let local = ClientConfig::local();
        self.config.host = local.host;
        self.config.port = local.port;
        self.config.transport = local.transport;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
