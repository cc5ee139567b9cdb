use crate::frame::Version;

/// Errors that can occur while encoding frames or driving a frame stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message id does not fit in the header of the requested version.
    #[error("message id {id} cannot be sent as {version}")]
    MessageIdOutOfRange { id: u32, version: Version },

    /// No spec registered for the message id.
    #[error("unknown message id {0}")]
    UnknownMessage(u32),

    /// The encoded payload does not fit in one frame.
    #[error("payload too large ({size} bytes, max 255)")]
    PayloadTooLarge { size: usize },

    /// A signed frame was modified but no key is available to re-sign it.
    #[error("frame is signed but no signing key is configured")]
    SigningKeyMissing,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A recoverable decode failure.
///
/// The decoder has already discarded input past the failure point when one of
/// these is returned, so the caller can simply keep decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Bytes that do not start a frame were skipped.
    #[error("skipped {discarded} bytes before a frame start marker")]
    InvalidMagic { discarded: usize },

    /// A v2 header carries incompatibility flags this codec does not understand.
    #[error("unsupported incompat flags {0:#04x}")]
    UnsupportedIncompatFlags(u8),

    #[error("checksum mismatch for message {message_id}: expected {expected:#06x}, found {found:#06x}")]
    ChecksumMismatch {
        message_id: u32,
        expected: u16,
        found: u16,
    },

    /// No spec registered for the id and unknown messages are rejected.
    #[error("unknown message id {0}")]
    UnknownMessageId(u32),

    /// Signing is required but the frame carries no signature.
    #[error("unsigned frame from {system_id}:{component_id}")]
    SignatureMissing { system_id: u8, component_id: u8 },

    /// No configured key produces the frame's signature.
    #[error("invalid signature from {system_id}:{component_id}")]
    InvalidSignature { system_id: u8, component_id: u8 },

    /// The signature timestamp is not newer than the last accepted one.
    #[error("replayed frame from {system_id}:{component_id} (timestamp {timestamp}, last {last})")]
    ReplayDetected {
        system_id: u8,
        component_id: u8,
        timestamp: u64,
        last: u64,
    },
}
