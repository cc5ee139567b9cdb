use std::time::Duration;

use mavnode_node::{CommandOptions, Direction, Event, NodeError};
use mavnode_schema::common::CommandLong;

use crate::cmd::{parse_duration, parse_endpoint, CommandArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_response, OutputFormat};

/// Longer than the TCP endpoint's own connect timeout.
const OPEN_TIMEOUT: Duration = Duration::from_secs(15);

pub fn run(args: CommandArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let node = mavnode_node::Node::new(args.node.config()?)
        .map_err(|err| node_error("node setup failed", err))?;
    node.add_endpoint(parse_endpoint(&args.endpoint)?, Direction::Duplex)
        .map_err(|err| node_error("open failed", err))?;

    // The command can only go out once the endpoint is connected.
    let channel = match node.recv_timeout(OPEN_TIMEOUT) {
        Ok(Some(Event::ChannelOpen { channel, .. })) => channel,
        Ok(Some(Event::ChannelClose { reason, .. })) => {
            return Err(CliError::new(TRANSPORT_ERROR, format!("open failed: {reason}")));
        }
        Ok(_) => return Err(CliError::new(TRANSPORT_ERROR, "endpoint did not open in time")),
        Err(err) => return Err(node_error("open failed", err)),
    };

    let mut command = CommandLong::new(args.target_system, args.target_component, args.command);
    for (index, value) in args.params.iter().enumerate() {
        command = command.with_param(index + 1, *value);
    }

    let options = CommandOptions::default()
        .with_timeout(timeout)
        .with_retries(args.retries)
        .with_channel(channel)
        .on_progress(|progress| tracing::info!(progress, "command in progress"));

    match node.send_command(command, options) {
        Ok(response) => {
            print_response(&response, format);
            Ok(SUCCESS)
        }
        Err(NodeError::CommandRejected { response }) => {
            print_response(&response, format);
            Err(node_error("command", NodeError::CommandRejected { response }))
        }
        Err(err) => Err(node_error("command", err)),
    }
}
