use std::time::Duration;

use crate::command::CommandResponse;
use crate::event::ChannelId;

/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mavnode_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mavnode_frame::FrameError),

    /// The channel was closed or never existed.
    #[error("channel {0} is closed or unknown")]
    ChannelClosed(ChannelId),

    /// The channel is read-only.
    #[error("channel {0} is not writable")]
    ChannelNotWritable(ChannelId),

    /// The node has been closed.
    #[error("node is closed")]
    NodeClosed,

    /// The configuration cannot be used.
    #[error("invalid node configuration: {0}")]
    InvalidConfig(String),

    /// A channel or heartbeat thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A command with the same target and id is still waiting for its result.
    #[error("command {command} to {target_system}:{target_component} is already pending")]
    CommandPending {
        command: u16,
        target_system: u8,
        target_component: u8,
    },

    /// No final acknowledgement arrived in time.
    #[error("command {command} to {target_system}:{target_component} timed out after {timeout:?}")]
    CommandTimeout {
        command: u16,
        target_system: u8,
        target_component: u8,
        timeout: Duration,
    },

    /// The command finished with a result other than `MAV_RESULT_ACCEPTED`.
    #[error("command {} rejected: {}", .response.command, .response.result)]
    CommandRejected { response: CommandResponse },
}

pub type Result<T> = std::result::Result<T, NodeError>;
