//! MAVLink v1/v2 frame codec with message signing.
//!
//! Frames are laid out as:
//! ```text
//! v1: FE len seq sys comp msgid                          payload crc16
//! v2: FD len incompat compat seq sys comp msgid[3 LE]    payload crc16 [signature(13)]
//! ```
//! The checksum is X.25 over everything after the start marker plus the
//! message's CRC_EXTRA seed. The decoder works on an incrementally filled
//! buffer, resynchronizes after bad input, and always makes progress.

pub mod codec;
#[cfg(feature = "async")]
pub mod codec_async;
pub mod error;
pub mod frame;
pub mod reader;
pub mod signing;
pub mod writer;

pub use codec::{decode_frame, encode_message, fix_frame, FrameConfig};
#[cfg(feature = "async")]
pub use codec_async::MavCodec;
pub use error::{FrameError, ParseError, Result};
pub use frame::{Frame, Identity, Signature, Version, MAX_PAYLOAD_LEN};
pub use reader::{Decoded, FrameReader};
pub use signing::{timestamp_now, Signer, SigningKey, Verifier};
pub use writer::FrameWriter;
