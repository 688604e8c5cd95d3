//! Command definitions
//!
//! Typed representation of the commands accepted by the daemon, plus a
//! raw escape hatch for verbs the crate does not model.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{ClientError, Result};

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    SetPorts,
    List,
    Disconnect,
    Setup,
    Quit,
    ClientConnect,
    ClientDisconnect,
}

impl Verb {
    /// Wire spelling of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::SetPorts => "SET_PORTS",
            Verb::List => "LIST",
            Verb::Disconnect => "DISCONNECT",
            Verb::Setup => "SETUP",
            Verb::Quit => "QUIT",
            Verb::ClientConnect => "CLIENT_CONNECT",
            Verb::ClientDisconnect => "CLIENT_DISCONNECT",
        }
    }

    /// Look up a verb by its wire spelling (case-sensitive)
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "SET_PORTS" => Some(Verb::SetPorts),
            "LIST" => Some(Verb::List),
            "DISCONNECT" => Some(Verb::Disconnect),
            "SETUP" => Some(Verb::Setup),
            "QUIT" => Some(Verb::Quit),
            "CLIENT_CONNECT" => Some(Verb::ClientConnect),
            "CLIENT_DISCONNECT" => Some(Verb::ClientDisconnect),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A VPN client session as reported on the local channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub profile_id: String,
    pub common_name: String,
    /// Connect time (unix seconds); identifies the session together with `ipv4`
    pub time_unix: u64,
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
}

/// Counters sent with `CLIENT_DISCONNECT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrafficStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub duration_secs: u64,
}

/// A command for the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set the OpenVPN management ports the daemon talks to
    SetPorts { ports: Vec<u16> },

    /// List connected VPN clients
    List,

    /// Disconnect clients by common name
    Disconnect { common_names: Vec<String> },

    /// Set up a common name for a list of profiles
    Setup {
        common_name: String,
        profiles: Vec<String>,
    },

    /// End the session
    Quit,

    /// Local channel: a VPN client connected
    ClientConnect(ClientEvent),

    /// Local channel: a VPN client disconnected
    ClientDisconnect {
        event: ClientEvent,
        stats: TrafficStats,
    },

    /// Any other line, sent verbatim
    Raw(String),
}

impl Command {
    /// Get the command verb, `None` for raw commands
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Command::SetPorts { .. } => Some(Verb::SetPorts),
            Command::List => Some(Verb::List),
            Command::Disconnect { .. } => Some(Verb::Disconnect),
            Command::Setup { .. } => Some(Verb::Setup),
            Command::Quit => Some(Verb::Quit),
            Command::ClientConnect(_) => Some(Verb::ClientConnect),
            Command::ClientDisconnect { .. } => Some(Verb::ClientDisconnect),
            Command::Raw(_) => None,
        }
    }

    /// Whether the daemon ends the session after answering this command
    pub fn is_quit(&self) -> bool {
        match self {
            Command::Quit => true,
            Command::Raw(line) => line.trim() == Verb::Quit.as_str(),
            _ => false,
        }
    }

    /// Check the command can be put on the wire
    ///
    /// Rejects embedded line breaks (they would split the command into
    /// two) and argument values the daemon's grammar cannot accept.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::SetPorts { ports } => {
                if ports.is_empty() {
                    return Err(invalid("SET_PORTS needs at least one port"));
                }
                if ports.contains(&0) {
                    return Err(invalid("SET_PORTS: port 0 is not allowed"));
                }
                Ok(())
            }
            Command::Disconnect { common_names } => {
                if common_names.is_empty() {
                    return Err(invalid("DISCONNECT needs at least one common name"));
                }
                common_names.iter().try_for_each(|cn| check_name("common name", cn))
            }
            Command::Setup {
                common_name,
                profiles,
            } => {
                check_name("common name", common_name)?;
                profiles.iter().try_for_each(|p| check_name("profile", p))
            }
            Command::ClientConnect(event) | Command::ClientDisconnect { event, .. } => {
                check_name("profile", &event.profile_id)?;
                check_name("common name", &event.common_name)
            }
            Command::Raw(line) => {
                if line.contains(['\n', '\r']) {
                    return Err(invalid("command contains a line break"));
                }
                if !line.is_ascii() {
                    return Err(invalid("command contains non-ASCII characters"));
                }
                if line.trim().is_empty() {
                    return Err(invalid("empty command"));
                }
                Ok(())
            }
            Command::List | Command::Quit => Ok(()),
        }
    }

    /// Validate and render the wire line (without the trailing newline)
    pub fn to_line(&self) -> Result<String> {
        self.validate()?;
        Ok(self.to_string())
    }

    /// Parse a text line into a command
    ///
    /// Known verbs must carry well-formed arguments; unknown verbs become
    /// [`Command::Raw`].
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let mut fields = line.split_whitespace();
        let Some(verb) = fields.next() else {
            return Err(invalid("empty command"));
        };
        let args: Vec<&str> = fields.collect();

        let command = match Verb::from_wire(verb) {
            Some(Verb::SetPorts) => Command::SetPorts {
                ports: args
                    .iter()
                    .map(|a| parse_field::<u16>("port", a))
                    .collect::<Result<_>>()?,
            },
            Some(Verb::List) => {
                no_args(Verb::List, &args)?;
                Command::List
            }
            Some(Verb::Disconnect) => Command::Disconnect {
                common_names: args.iter().map(|a| a.to_string()).collect(),
            },
            Some(Verb::Setup) => {
                let (common_name, profiles) = args
                    .split_first()
                    .ok_or_else(|| invalid("SETUP needs a common name"))?;
                Command::Setup {
                    common_name: common_name.to_string(),
                    profiles: profiles.iter().map(|p| p.to_string()).collect(),
                }
            }
            Some(Verb::Quit) => {
                no_args(Verb::Quit, &args)?;
                Command::Quit
            }
            Some(Verb::ClientConnect) => {
                if args.len() != 5 {
                    return Err(invalid(format!(
                        "CLIENT_CONNECT expects 5 arguments, got {}",
                        args.len()
                    )));
                }
                Command::ClientConnect(parse_event(&args)?)
            }
            Some(Verb::ClientDisconnect) => {
                if args.len() != 8 {
                    return Err(invalid(format!(
                        "CLIENT_DISCONNECT expects 8 arguments, got {}",
                        args.len()
                    )));
                }
                Command::ClientDisconnect {
                    event: parse_event(&args[..5])?,
                    stats: TrafficStats {
                        bytes_received: parse_field("bytes received", args[5])?,
                        bytes_sent: parse_field("bytes sent", args[6])?,
                        duration_secs: parse_field("duration", args[7])?,
                    },
                }
            }
            None => Command::Raw(line.to_string()),
        };

        command.validate()?;
        Ok(command)
    }
}

impl FromStr for Command {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Command::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetPorts { ports } => {
                f.write_str(Verb::SetPorts.as_str())?;
                for port in ports {
                    write!(f, " {}", port)?;
                }
                Ok(())
            }
            Command::List => f.write_str(Verb::List.as_str()),
            Command::Disconnect { common_names } => {
                f.write_str(Verb::Disconnect.as_str())?;
                for cn in common_names {
                    write!(f, " {}", cn)?;
                }
                Ok(())
            }
            Command::Setup {
                common_name,
                profiles,
            } => {
                write!(f, "{} {}", Verb::Setup, common_name)?;
                for profile in profiles {
                    write!(f, " {}", profile)?;
                }
                Ok(())
            }
            Command::Quit => f.write_str(Verb::Quit.as_str()),
            Command::ClientConnect(event) => {
                write!(f, "{} ", Verb::ClientConnect)?;
                write_event(f, event)
            }
            Command::ClientDisconnect { event, stats } => {
                write!(f, "{} ", Verb::ClientDisconnect)?;
                write_event(f, event)?;
                write!(
                    f,
                    " {} {} {}",
                    stats.bytes_received, stats.bytes_sent, stats.duration_secs
                )
            }
            Command::Raw(line) => f.write_str(line),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn invalid(reason: impl Into<String>) -> ClientError {
    ClientError::InvalidCommand(reason.into())
}

/// Names accepted by the daemon: `[A-Za-z0-9-.]+`
fn check_name(what: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(invalid(format!("invalid {} {:?}", what, name)))
    }
}

fn no_args(verb: Verb, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(invalid(format!("{} takes no arguments", verb)))
    }
}

fn parse_field<T: FromStr>(what: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| invalid(format!("invalid {} {:?}", what, value)))
}

fn parse_event(args: &[&str]) -> Result<ClientEvent> {
    Ok(ClientEvent {
        profile_id: args[0].to_string(),
        common_name: args[1].to_string(),
        time_unix: parse_field("time", args[2])?,
        ipv4: parse_field("IPv4 address", args[3])?,
        ipv6: parse_field("IPv6 address", args[4])?,
    })
}

fn write_event(f: &mut fmt::Formatter<'_>, event: &ClientEvent) -> fmt::Result {
    write!(
        f,
        "{} {} {} {} {}",
        event.profile_id, event.common_name, event.time_unix, event.ipv4, event.ipv6
    )
}
