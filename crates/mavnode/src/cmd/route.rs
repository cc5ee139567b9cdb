use std::sync::atomic::Ordering;
use std::time::Duration;

use mavnode_node::Event;

use crate::cmd::{install_ctrlc_handler, RouteArgs};
use crate::exit::{node_error, CliResult, SUCCESS};

const POLL: Duration = Duration::from_millis(200);

/// Forward every frame received on one endpoint to all the others, unchanged.
pub fn run(args: RouteArgs) -> CliResult<i32> {
    let node = args.node.open(&args.endpoints)?;
    let running = install_ctrlc_handler()?;
    let mut remaining = args.endpoints.len();
    let mut relayed = 0u64;

    while running.load(Ordering::SeqCst) && remaining > 0 {
        let event = match node.recv_timeout(POLL) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => return Err(node_error("receive failed", err)),
        };

        match event {
            Event::FrameReceived { channel, frame } => {
                if let Err(err) = node.write_frame_except(channel, &frame) {
                    tracing::warn!(%channel, error = %err, "relay failed");
                    continue;
                }
                relayed += 1;
            }
            Event::ParseError { channel, error } => {
                tracing::debug!(%channel, %error, "dropped invalid input");
            }
            Event::ChannelOpen { .. } => {}
            Event::ChannelClose { label, reason, .. } => {
                tracing::warn!(%label, %reason, "endpoint gone");
                remaining -= 1;
            }
        }
    }

    node.close();
    tracing::info!(relayed, "router stopped");
    Ok(SUCCESS)
}
