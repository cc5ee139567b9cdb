use std::fmt;
use std::io;

use mavnode_frame::FrameError;
use mavnode_node::NodeError;
use mavnode_transport::TransportError;

// Exit codes follow the BSD sysexits / coreutils `timeout` conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const COMMAND_REJECTED: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 65;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => io_code(source),
        TransportError::Closed => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match &err {
        FrameError::Io(source) => io_code(source),
        FrameError::ConnectionClosed => TRANSPORT_ERROR,
        FrameError::MessageIdOutOfRange { .. }
        | FrameError::UnknownMessage(_)
        | FrameError::PayloadTooLarge { .. } => DATA_INVALID,
        FrameError::SigningKeyMissing => USAGE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn node_error(context: &str, err: NodeError) -> CliError {
    match err {
        NodeError::Transport(err) => transport_error(context, err),
        NodeError::Frame(err) => frame_error(context, err),
        NodeError::InvalidConfig(_) => CliError::usage(format!("{context}: {err}")),
        NodeError::CommandTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        NodeError::CommandRejected { .. } => {
            CliError::new(COMMAND_REJECTED, format!("{context}: {err}"))
        }
        NodeError::ChannelClosed(_) | NodeError::NodeClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_transport_error() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let cli = node_error("connect failed", NodeError::Transport(err));
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn command_timeout_maps_to_timeout_code() {
        let err = NodeError::CommandTimeout {
            command: 400,
            target_system: 1,
            target_component: 1,
            timeout: std::time::Duration::from_secs(1),
        };
        assert_eq!(node_error("command", err).code, TIMEOUT);
    }
}
