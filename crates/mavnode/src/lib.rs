//! MAVLink v1/v2 framing, message signing and multi-channel routing.
//!
//! mavnode reads and writes MAVLink frames over any byte stream, signs and
//! verifies MAVLink 2 traffic, multiplexes many links into one event stream,
//! and runs the command/acknowledgement protocol on top.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream transports (TCP, Unix sockets, in-memory pipes)
//! - [`schema`]: message schema contract, dialect registry and the built-in `common` messages
//! - [`frame`]: frame codec, checksums, signing and replay protection
//! - [`node`]: channels, routing, heartbeats and commands
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mavnode::transport::TcpClient;
//! use mavnode::{Direction, Event, Identity, Node, NodeConfig};
//!
//! let node = Node::new(NodeConfig::new(Identity::new(255, 190)))?;
//! node.add_endpoint(Box::new(TcpClient::new("127.0.0.1:5760")), Direction::Duplex)?;
//! for event in node.events() {
//!     if let Event::FrameReceived { channel, frame } = event {
//!         println!("{channel}: message {} from {}", frame.message_id, frame.source());
//!     }
//! }
//! # Ok::<(), mavnode::NodeError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use mavnode_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use mavnode_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mavnode_frame::*;
}

/// Re-export node types.
pub mod node {
    pub use mavnode_node::*;
}

pub use mavnode_frame::{Frame, Identity, ParseError, SigningKey, Version};
pub use mavnode_node::{
    ChannelId, CloseReason, CommandOptions, CommandResponse, Direction, Event, Node, NodeConfig,
    NodeError, SigningConfig,
};
