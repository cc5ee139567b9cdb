use std::fmt;

use mavnode_frame::{Frame, ParseError};

/// Node-unique channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u64);

impl ChannelId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which ways a channel carries traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    #[default]
    Duplex,
    /// Frames are received but never written.
    ReadOnly,
    /// Frames are written; nothing is read.
    WriteOnly,
}

impl Direction {
    pub fn readable(self) -> bool {
        self != Direction::WriteOnly
    }

    pub fn writable(self) -> bool {
        self != Direction::ReadOnly
    }
}

/// An open channel as listed by [`crate::Node::channels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub label: String,
    pub direction: Direction,
}

/// Why a channel closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote end closed the stream.
    Eof,
    /// A read or write failed.
    Error(String),
    /// The channel or the whole node was closed locally.
    Shutdown,
    /// The endpoint could not be opened.
    OpenFailed(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Eof => f.write_str("end of stream"),
            CloseReason::Error(err) => write!(f, "error: {err}"),
            CloseReason::Shutdown => f.write_str("shutdown"),
            CloseReason::OpenFailed(err) => write!(f, "open failed: {err}"),
        }
    }
}

/// Item of the node's merged event stream.
///
/// Events of one channel arrive in the order they happened on that channel.
/// There is no ordering between channels.
#[derive(Debug, Clone)]
pub enum Event {
    ChannelOpen {
        channel: ChannelId,
        label: String,
    },
    ChannelClose {
        channel: ChannelId,
        label: String,
        reason: CloseReason,
    },
    FrameReceived {
        channel: ChannelId,
        frame: Frame,
    },
    ParseError {
        channel: ChannelId,
        error: ParseError,
    },
}

impl Event {
    /// Channel the event belongs to.
    pub fn channel(&self) -> ChannelId {
        match self {
            Event::ChannelOpen { channel, .. }
            | Event::ChannelClose { channel, .. }
            | Event::FrameReceived { channel, .. }
            | Event::ParseError { channel, .. } => *channel,
        }
    }

    /// The frame, for `FrameReceived` events.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Event::FrameReceived { frame, .. } => Some(frame),
            _ => None,
        }
    }
}
