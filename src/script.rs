//! Command Scripts
//!
//! A script is a list of commands sent over one session, in order,
//! stopping at the first failure.
//!
//! ## Text Format
//! ```text
//! # comment
//! SET_PORTS 11940 11941
//! LIST
//! DISCONNECT foo bar baz
//! QUIT
//! ```
//!
//! `QUIT` may only appear as the last command.

use std::io::{Read, Write};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::protocol::{Command, Response};

/// One command and the reply it got
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub command: Command,
    pub response: Response,
}

/// An ordered list of commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    commands: Vec<Command>,
}

impl Script {
    /// Build a script, rejecting any command after a `QUIT`
    pub fn new(commands: Vec<Command>) -> Result<Self> {
        if let Some(pos) = commands.iter().position(Command::is_quit) {
            if pos + 1 != commands.len() {
                return Err(ClientError::InvalidScript {
                    index: pos + 1,
                    reason: "command after QUIT".to_string(),
                });
            }
        }
        Ok(Self { commands })
    }

    /// Parse a script, one command per line
    ///
    /// Errors carry the 1-based source line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut commands = Vec::new();
        let mut quit_seen = false;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if quit_seen {
                return Err(ClientError::Script {
                    line: idx + 1,
                    reason: "command after QUIT".to_string(),
                });
            }
            let command = Command::parse(line).map_err(|e| ClientError::Script {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            quit_seen = command.is_quit();
            commands.push(command);
        }

        Ok(Self { commands })
    }

    /// The sequence the daemon is usually exercised with
    pub fn reference() -> Self {
        Self {
            commands: vec![
                Command::SetPorts {
                    ports: vec![11940, 11941],
                },
                Command::List,
                Command::Disconnect {
                    common_names: vec!["foo".into(), "bar".into(), "baz".into()],
                },
                Command::Quit,
            ],
        }
    }

    /// Append `QUIT` unless the script already ends with it
    pub fn ensure_quit(mut self) -> Self {
        if !self.ends_with_quit() {
            self.commands.push(Command::Quit);
        }
        self
    }

    pub fn ends_with_quit(&self) -> bool {
        self.commands.last().is_some_and(Command::is_quit)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run every command, handing each reply to `on_response` as it arrives
    ///
    /// Returns the number of commands answered; the first error ends the run.
    pub fn run_with<S, F>(&self, client: &mut Client<S>, mut on_response: F) -> Result<usize>
    where
        S: Read + Write,
        F: FnMut(&Command, &Response),
    {
        for (done, command) in self.commands.iter().enumerate() {
            let response = client.send(command).map_err(|e| {
                tracing::debug!("Script stopped at command {} of {}", done + 1, self.len());
                e
            })?;
            on_response(command, &response);
        }
        Ok(self.commands.len())
    }

    /// Run every command and collect the exchanges
    pub fn run<S: Read + Write>(&self, client: &mut Client<S>) -> Result<Vec<Exchange>> {
        let mut exchanges = Vec::with_capacity(self.len());
        self.run_with(client, |command, response| {
            exchanges.push(Exchange {
                command: command.clone(),
                response: response.clone(),
            })
        })?;
        Ok(exchanges)
    }
}
