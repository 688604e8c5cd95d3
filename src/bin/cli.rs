//! vpnd-client CLI
//!
//! Command-line interface for the VPN daemon's control channel.

use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vpnd_client::config::ConfigBuilder;
use vpnd_client::protocol::{ClientEvent, TrafficStats};
use vpnd_client::{Client, ClientConfig, ClientError, Command, Script, TlsOptions};

/// vpnd-client CLI
#[derive(Parser, Debug)]
#[command(name = "vpnd-client")]
#[command(about = "Send commands to the VPN daemon's control channel")]
#[command(version)]
struct Args {
    /// TOML config file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Daemon port
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Talk to the local notification channel (127.0.0.1:41195, no QUIT)
    #[arg(long)]
    local: bool,

    /// Use TLS with a client certificate
    #[arg(long, requires_all = ["peer_name", "ca_file", "cert", "key"])]
    tls: bool,

    /// Name the daemon's certificate must be valid for
    #[arg(long)]
    peer_name: Option<String>,

    /// Trusted CA bundle (PEM)
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Client certificate (PEM)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Client private key (PEM)
    #[arg(long)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the OpenVPN management ports
    SetPorts {
        #[arg(required = true)]
        ports: Vec<u16>,
    },

    /// List connected VPN clients
    List,

    /// Disconnect clients by common name
    Disconnect {
        #[arg(required = true)]
        common_names: Vec<String>,
    },

    /// Set up a common name for profiles
    Setup {
        common_name: String,
        profiles: Vec<String>,
    },

    /// Report a client connect (local channel)
    ClientConnect {
        profile_id: String,
        common_name: String,
        time_unix: u64,
        ipv4: Ipv4Addr,
        ipv6: Ipv6Addr,
    },

    /// Report a client disconnect (local channel)
    ClientDisconnect {
        profile_id: String,
        common_name: String,
        time_unix: u64,
        ipv4: Ipv4Addr,
        ipv6: Ipv6Addr,
        bytes_received: u64,
        bytes_sent: u64,
        duration: u64,
    },

    /// Send a raw command line
    Raw {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Run a script of commands (default: SET_PORTS, LIST, DISCONNECT, QUIT)
    Run {
        /// Script file, one command per line
        script: Option<PathBuf>,
    },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,vpnd_client=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        match e.status_line() {
            // The daemon's own words are the result here; print them as-is
            Some(status_line) => println!("{}", status_line),
            None => tracing::error!("{}", e),
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> vpnd_client::Result<()> {
    let local = args.local || args.command.is_local_notification();
    let config = build_config(&args, local)?;

    let show_commands = matches!(args.command, Commands::Run { .. });

    let script = match args.command {
        Commands::Run { script } => load_script(script)?,
        command => Script::new(command.into_command().into_iter().collect())?,
    };
    // The local channel does not know QUIT
    let script = if local { script } else { script.ensure_quit() };

    tracing::info!("vpnd-client v{}", vpnd_client::VERSION);
    let mut client = Client::connect(&config)?;

    script.run_with(&mut client, |command, response| {
        if show_commands {
            println!("{}", command);
            for line in response.lines() {
                println!("  {}", line);
            }
        } else {
            for line in response.lines() {
                println!("{}", line);
            }
        }
    })?;

    Ok(())
}

fn build_config(args: &Args, local: bool) -> vpnd_client::Result<ClientConfig> {
    let base = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if local {
        builder = builder.local_channel();
    }
    if let Some(host) = &args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(secs) = args.connect_timeout {
        builder = builder.connect_timeout(Duration::from_secs(secs.max(1)));
    }
    if args.tls {
        // clap guarantees all four are present
        if let (Some(peer_name), Some(ca_file), Some(cert), Some(key)) =
            (&args.peer_name, &args.ca_file, &args.cert, &args.key)
        {
            builder = builder.tls(TlsOptions {
                peer_name: peer_name.clone(),
                ca_file: ca_file.clone(),
                local_cert: cert.clone(),
                local_key: key.clone(),
            });
        }
    }

    Ok(builder.build())
}

fn load_script(path: Option<PathBuf>) -> vpnd_client::Result<Script> {
    let Some(path) = path else {
        return Ok(Script::reference());
    };
    let text = fs::read_to_string(&path)
        .map_err(|e| ClientError::Config(format!("unable to read {}: {}", path.display(), e)))?;
    Script::parse(&text)
}

impl Commands {
    fn is_local_notification(&self) -> bool {
        matches!(
            self,
            Commands::ClientConnect { .. } | Commands::ClientDisconnect { .. }
        )
    }

    /// The single command a subcommand sends; `None` for `run`
    fn into_command(self) -> Option<Command> {
        let command = match self {
            Commands::SetPorts { ports } => Command::SetPorts { ports },
            Commands::List => Command::List,
            Commands::Disconnect { common_names } => Command::Disconnect { common_names },
            Commands::Setup {
                common_name,
                profiles,
            } => Command::Setup {
                common_name,
                profiles,
            },
            Commands::ClientConnect {
                profile_id,
                common_name,
                time_unix,
                ipv4,
                ipv6,
            } => Command::ClientConnect(ClientEvent {
                profile_id,
                common_name,
                time_unix,
                ipv4,
                ipv6,
            }),
            Commands::ClientDisconnect {
                profile_id,
                common_name,
                time_unix,
                ipv4,
                ipv6,
                bytes_received,
                bytes_sent,
                duration,
            } => Command::ClientDisconnect {
                event: ClientEvent {
                    profile_id,
                    common_name,
                    time_unix,
                    ipv4,
                    ipv6,
                },
                stats: TrafficStats {
                    bytes_received,
                    bytes_sent,
                    duration_secs: duration,
                },
            },
            Commands::Raw { words } => Command::Raw(words.join(" ")),
            Commands::Run { .. } => return None,
        };
        Some(command)
    }
}
