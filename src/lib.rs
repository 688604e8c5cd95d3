//! # vpnd-client
//!
//! Client for the VPN daemon's control channel:
//! - Plain TCP or mutually authenticated TLS transport
//! - Line-oriented command/response protocol (`OK: <n>` + n lines)
//! - Sessions that stop at the first daemon error
//! - Command scripts and a scripted mock daemon for tests
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CLI / Script runner                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Client (session)                           │
//! │            Open ─► Closed (QUIT) / Failed (ERR)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Protocol   │          │  Transport  │
//!   │ (line codec)│          │ (TCP / TLS) │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use vpnd_client::{Client, ClientConfig};
//!
//! # fn main() -> vpnd_client::Result<()> {
//! let mut client = Client::connect(&ClientConfig::default())?;
//! client.set_ports(&[11940, 11941])?;
//! for conn in client.list()? {
//!     println!("{} {:?} {:?}", conn.common_name, conn.ipv4, conn.ipv6);
//! }
//! client.quit()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod client;
pub mod script;
#[cfg(feature = "testing")]
pub mod testing;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ClientError, Result};
pub use config::{ClientConfig, TlsOptions, TransportConfig};
pub use client::{Client, SessionState};
pub use protocol::{Command, ConnectionInfo, Response, Status};
pub use script::Script;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vpnd-client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
