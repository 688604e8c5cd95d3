//! Testing Module
//!
//! A scripted stand-in for the daemon, for tests and manual runs.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls a shutdown flag)
//! - One thread per connection
//! - Replies looked up by verb in a shared table
//! - Every received line reported on a channel

mod connection;
mod daemon;

pub use daemon::{MockDaemon, MockDaemonBuilder, Reply, ServerTls};
