//! Duplex byte-stream transport abstraction.
//!
//! Every MAVLink channel sits on top of a [`Transport`]: something that can be
//! read from, written to, and closed from another thread. Closing must unblock
//! a pending read, which is what lets a node tear a channel down promptly.
//!
//! This is the lowest layer of mavnode. Dialing, listening and reconnect
//! policies stay outside of it and hand finished transports over through an
//! [`Endpoint`].

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::{memory_pair, MemoryTransport};
pub use tcp::TcpClient;
pub use traits::{Endpoint, Transport, TransportIo};

#[cfg(unix)]
pub use uds::UnixClient;
