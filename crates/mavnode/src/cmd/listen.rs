use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mavnode_node::{CloseReason, Event};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_frame, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let node = args.node.open(&args.endpoints)?;
    let running = install_ctrlc_handler()?;

    let mut labels = HashMap::new();
    let mut remaining = args.endpoints.len();
    let mut opened = 0usize;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) && remaining > 0 {
        let event = match node.recv_timeout(POLL) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => return Err(node_error("receive failed", err)),
        };

        match event {
            Event::ChannelOpen { channel, label } => {
                opened += 1;
                labels.insert(channel, label);
            }
            Event::ChannelClose { label, reason, .. } => {
                remaining -= 1;
                if let CloseReason::OpenFailed(err) = &reason {
                    tracing::error!(%label, error = %err, "endpoint unavailable");
                }
            }
            Event::ParseError { channel, error } => {
                if args.show_errors {
                    eprintln!("[{channel}] {error}");
                }
            }
            Event::FrameReceived { channel, frame } => {
                if let Some(ids) = &args.messages {
                    if !ids.contains(&frame.message_id) {
                        continue;
                    }
                }
                let label = labels.get(&channel).map(String::as_str).unwrap_or("?");
                print_frame(&frame, label, node.registry(), format);
                printed += 1;
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
        }
    }

    node.close();
    if opened == 0 {
        return Err(CliError::new(TRANSPORT_ERROR, "no endpoint could be opened"));
    }
    Ok(SUCCESS)
}
