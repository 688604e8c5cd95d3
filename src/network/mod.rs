//! Network Module
//!
//! Connection establishment for the control channel.
//!
//! ## Transports
//! - Plain TCP
//! - TLS over TCP with client certificates (rustls)

mod transport;
pub mod tls;

pub use transport::{connect, Transport};
pub use tls::TlsStream;
