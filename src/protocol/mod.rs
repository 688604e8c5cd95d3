//! Protocol Module
//!
//! Defines the line-oriented wire protocol spoken on the daemon's
//! control channel.
//!
//! ## Request Format
//! ```text
//! <VERB> <arg1> <arg2> ...\n
//! ```
//!
//! ## Response Format
//! ```text
//! OK: <N>\n          success, followed by exactly N payload lines
//! <line 1>\n
//! ...
//! <line N>\n
//!
//! ERR: <CODE>\n      anything not starting with "OK: " is an error
//! ```
//!
//! ### Verbs
//! - SET_PORTS <port>+        - OpenVPN management ports to talk to
//! - LIST                     - one `<cn> <ipv4> <ipv6>` line per client
//! - DISCONNECT <cn>+         - kill clients by common name
//! - SETUP <cn> <profile>*    - unconfirmed upstream
//! - QUIT                     - end of session
//! - CLIENT_CONNECT / CLIENT_DISCONNECT (local channel only)

mod codec;
mod command;
mod response;

pub use codec::{
    encode_command, encode_error, encode_response, read_response, read_status, write_command,
    write_response, MAX_LINE_LEN, OK_PREFIX,
};
pub use command::{ClientEvent, Command, TrafficStats, Verb};
pub use response::{ConnectionInfo, Response, Status};
