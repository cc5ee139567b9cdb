use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use mavnode_frame::{Identity, SigningKey, Version};
use mavnode_node::{Direction, HeartbeatConfig, Node, NodeConfig, SigningConfig};
use mavnode_transport::{Endpoint, TcpClient};

use crate::exit::{node_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod command;
pub mod listen;
pub mod route;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to endpoints and print received frames.
    Listen(ListenArgs),
    /// Relay frames between endpoints.
    Route(RouteArgs),
    /// Send a COMMAND_LONG and wait for its acknowledgement.
    Command(CommandArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Route(args) => route::run(args),
        Command::Command(args) => command::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Identity, protocol and signing options shared by every networked command.
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// System id of this node.
    #[arg(long, default_value = "255")]
    pub system_id: u8,
    /// Component id of this node.
    #[arg(long, default_value = "190")]
    pub component_id: u8,
    /// Send MAVLink 1 frames.
    #[arg(long, conflicts_with = "key")]
    pub mavlink1: bool,
    /// Signing passphrase; outgoing frames are signed and incoming ones verified.
    #[arg(long, env = "MAVNODE_SIGNING_KEY", hide_env_values = true)]
    pub key: Option<String>,
    /// Accept unsigned frames even when --key is set.
    #[arg(long, requires = "key")]
    pub allow_unsigned: bool,
    /// Link id written into outgoing signatures.
    #[arg(long, default_value = "0")]
    pub link_id: u8,
    /// Emit a HEARTBEAT at this interval (e.g. 1s, 500ms).
    #[arg(long, value_name = "INTERVAL")]
    pub heartbeat: Option<String>,
}

impl NodeArgs {
    pub fn config(&self) -> CliResult<NodeConfig> {
        let mut config = NodeConfig::new(Identity::new(self.system_id, self.component_id));
        if self.mavlink1 {
            config = config.with_out_version(Version::V1);
        }
        if let Some(passphrase) = &self.key {
            let signing = SigningConfig::shared(SigningKey::from_passphrase(passphrase))
                .with_link_id(self.link_id)
                .with_allow_unsigned(self.allow_unsigned);
            config = config.with_signing(signing);
        }
        if let Some(interval) = &self.heartbeat {
            let period = parse_duration(interval)?;
            config = config.with_heartbeat(HeartbeatConfig::default().with_period(period));
        }
        Ok(config)
    }

    /// Build a node and open every endpoint on it.
    pub fn open(&self, endpoints: &[String]) -> CliResult<Node> {
        let node = Node::new(self.config()?).map_err(|err| node_error("node setup failed", err))?;
        for spec in endpoints {
            let endpoint = parse_endpoint(spec)?;
            node.add_endpoint(endpoint, Direction::Duplex)
                .map_err(|err| node_error("open failed", err))?;
        }
        Ok(node)
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoints to read from (tcp:HOST:PORT or unix:PATH).
    #[arg(required = true)]
    pub endpoints: Vec<String>,
    /// Only print these message ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub messages: Option<Vec<u32>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also print parse errors to stderr.
    #[arg(long)]
    pub show_errors: bool,
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Endpoints to bridge (tcp:HOST:PORT or unix:PATH).
    #[arg(required = true, num_args = 2..)]
    pub endpoints: Vec<String>,
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Endpoint to send on (tcp:HOST:PORT or unix:PATH).
    pub endpoint: String,
    /// MAV_CMD id.
    pub command: u16,
    /// Command parameters, param1 first (up to 7).
    #[arg(num_args = 0..=7, allow_negative_numbers = true)]
    pub params: Vec<f32>,
    /// Target system id (0 = any).
    #[arg(long, default_value = "1")]
    pub target_system: u8,
    /// Target component id (0 = any).
    #[arg(long, default_value = "1")]
    pub target_component: u8,
    /// Time to wait for an acknowledgement (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
    /// Re-send this many times while nothing is acknowledged.
    #[arg(long, default_value = "0")]
    pub retries: u32,
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build details.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `tcp:HOST:PORT`, `unix:PATH`, or a bare `HOST:PORT` (TCP).
pub fn parse_endpoint(spec: &str) -> CliResult<Box<dyn Endpoint>> {
    if let Some(addr) = spec.strip_prefix("tcp:") {
        return tcp_endpoint(addr);
    }
    if let Some(path) = spec.strip_prefix("unix:") {
        return unix_endpoint(path);
    }
    tcp_endpoint(spec)
}

fn tcp_endpoint(addr: &str) -> CliResult<Box<dyn Endpoint>> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(Box::new(TcpClient::new(addr)))
        }
        _ => Err(CliError::usage(format!(
            "invalid TCP endpoint {addr:?}, expected HOST:PORT"
        ))),
    }
}

#[cfg(unix)]
fn unix_endpoint(path: &str) -> CliResult<Box<dyn Endpoint>> {
    if path.is_empty() {
        return Err(CliError::usage("unix endpoint needs a socket path"));
    }
    Ok(Box::new(mavnode_transport::UnixClient::new(path)))
}

#[cfg(not(unix))]
fn unix_endpoint(_path: &str) -> CliResult<Box<dyn Endpoint>> {
    Err(CliError::usage("unix endpoints are not supported on this platform"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Flag cleared by Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
