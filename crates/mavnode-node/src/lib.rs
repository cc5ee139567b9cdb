//! MAVLink session layer.
//!
//! A [`Node`] owns any number of channels, each a [`mavnode_transport::Transport`]
//! with its own reader thread. Everything the channels receive is merged into
//! a single [`Event`] stream. Outgoing messages are encoded once with the
//! node's identity and sequence counter and routed to one, all, or all-but-one
//! channel; received frames can be relayed verbatim.
//!
//! On top of that sits the command protocol: [`Node::send_command`] sends a
//! COMMAND_LONG or COMMAND_INT and waits for the matching COMMAND_ACK.

mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
mod heartbeat;
mod node;
#[cfg(test)]
mod testutil;

pub use command::{Command, CommandOptions, CommandResponse};
pub use config::{HeartbeatConfig, NodeConfig, SigningConfig};
pub use error::{NodeError, Result};
pub use event::{ChannelId, ChannelInfo, CloseReason, Direction, Event};
pub use node::{Events, Node};
