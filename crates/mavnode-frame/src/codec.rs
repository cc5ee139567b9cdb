use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use mavnode_schema::{common, DialectRegistry, Message, RegisteredMessage};
use tracing::trace;

use crate::error::{FrameError, ParseError, Result};
use crate::frame::{
    Frame, Identity, Signature, Version, CHECKSUM_LEN, INCOMPAT_SIGNED, MAGIC_V1, MAGIC_V2,
    MAX_PAYLOAD_LEN, SIGNATURE_LEN,
};
use crate::signing::{Signer, Verifier};

/// Configuration for the frame decoder.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Messages the decoder can check and decode.
    pub registry: Arc<DialectRegistry>,
    /// Signature policy. `None` accepts signed and unsigned frames without checking.
    pub verifier: Option<Arc<Verifier>>,
    /// Reject frames whose id is not in the registry instead of passing them through.
    pub reject_unknown_messages: bool,
}

impl FrameConfig {
    pub fn new(registry: Arc<DialectRegistry>) -> Self {
        Self {
            registry,
            verifier: None,
            reject_unknown_messages: false,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_reject_unknown_messages(mut self, reject: bool) -> Self {
        self.reject_unknown_messages = reject;
        self
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new(Arc::new(common::registry()))
    }
}

/// Encode a message into a new frame.
///
/// MAVLink 2 payloads have their trailing zero bytes trimmed (one byte is
/// always kept); MAVLink 1 payloads carry only the non-extension fields. With a
/// `signer`, MAVLink 2 frames are signed. MAVLink 1 frames cannot be signed and
/// are sent without a signature.
pub fn encode_message(
    message: &dyn Message,
    version: Version,
    sequence: u8,
    source: Identity,
    registry: &DialectRegistry,
    signer: Option<&Signer>,
) -> Result<Frame> {
    let id = message.id();
    if id > version.max_message_id() {
        return Err(FrameError::MessageIdOutOfRange { id, version });
    }
    let entry = registry.get(id).ok_or(FrameError::UnknownMessage(id))?;
    let signer = signer.filter(|_| version == Version::V2);

    let mut frame = Frame {
        version,
        incompat_flags: if signer.is_some() { INCOMPAT_SIGNED } else { 0 },
        compat_flags: 0,
        sequence,
        system_id: source.system_id,
        component_id: source.component_id,
        message_id: id,
        payload: encode_payload(message, version, entry)?,
        checksum: 0,
        signature: None,
        message: Some(message.clone_message()),
    };
    frame.checksum = frame.compute_checksum(entry.spec.crc_extra);
    if let Some(signer) = signer {
        frame.signature = Some(signer.sign(&frame));
    }
    Ok(frame)
}

/// Bring a frame's payload, checksum and signature back in line with its message.
///
/// Use this after changing a decoded message in place. Frames without a decoded
/// message only get their checksum recomputed. A signed frame is re-signed with
/// `signer`; without one it cannot be fixed.
pub fn fix_frame(
    frame: &mut Frame,
    registry: &DialectRegistry,
    signer: Option<&Signer>,
) -> Result<()> {
    let id = frame
        .message
        .as_ref()
        .map_or(frame.message_id, |message| message.id());
    if id > frame.version.max_message_id() {
        return Err(FrameError::MessageIdOutOfRange {
            id,
            version: frame.version,
        });
    }
    let entry = registry.get(id).ok_or(FrameError::UnknownMessage(id))?;
    if frame.is_signed() && signer.is_none() {
        return Err(FrameError::SigningKeyMissing);
    }

    if let Some(message) = &frame.message {
        frame.payload = encode_payload(message.as_ref(), frame.version, entry)?;
        frame.message_id = id;
    }
    frame.checksum = frame.compute_checksum(entry.spec.crc_extra);
    if frame.is_signed() {
        frame.signature = signer.map(|signer| signer.sign(frame));
    }
    Ok(())
}

fn encode_payload(
    message: &dyn Message,
    version: Version,
    entry: &RegisteredMessage,
) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(entry.max_len);
    message.encode_payload(&mut buf);
    let len = match version {
        Version::V1 => entry.base_len,
        Version::V2 => buf.iter().rposition(|&b| b != 0).map_or(1, |last| last + 1),
    };
    buf.resize(len, 0);
    if buf.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge { size: buf.len() });
    }
    Ok(buf.freeze())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` if more bytes are needed. On success the frame's bytes are
/// consumed. On a [`ParseError`] the offending input is consumed: a run of bytes
/// that cannot start a frame is skipped in one step, and any other failure drops
/// exactly one byte so the next call resynchronizes on the following marker.
/// Every error therefore makes forward progress.
pub fn decode_frame(
    src: &mut BytesMut,
    config: &FrameConfig,
) -> std::result::Result<Option<Frame>, ParseError> {
    let Some(start) = src.iter().position(|&b| b == MAGIC_V1 || b == MAGIC_V2) else {
        if src.is_empty() {
            return Ok(None);
        }
        let discarded = src.len();
        src.clear();
        return Err(ParseError::InvalidMagic { discarded });
    };
    if start > 0 {
        src.advance(start);
        return Err(ParseError::InvalidMagic { discarded: start });
    }

    let version = if src[0] == MAGIC_V1 {
        Version::V1
    } else {
        Version::V2
    };
    let header_len = version.header_len();
    if src.len() < header_len {
        return Ok(None);
    }

    let payload_len = src[1] as usize;
    let (incompat_flags, compat_flags, sequence, system_id, component_id, message_id) =
        match version {
            Version::V1 => (0, 0, src[2], src[3], src[4], src[5] as u32),
            Version::V2 => (
                src[2],
                src[3],
                src[4],
                src[5],
                src[6],
                u32::from_le_bytes([src[7], src[8], src[9], 0]),
            ),
        };
    if incompat_flags & !INCOMPAT_SIGNED != 0 {
        src.advance(1);
        return Err(ParseError::UnsupportedIncompatFlags(incompat_flags));
    }

    let signed = incompat_flags & INCOMPAT_SIGNED != 0;
    let total = header_len
        + payload_len
        + CHECKSUM_LEN
        + if signed { SIGNATURE_LEN } else { 0 };
    if src.len() < total {
        return Ok(None);
    }

    let checksum_at = header_len + payload_len;
    let checksum = u16::from_le_bytes([src[checksum_at], src[checksum_at + 1]]);
    let signature = signed.then(|| Signature::parse(&src[checksum_at + CHECKSUM_LEN..total]));
    let mut frame = Frame {
        version,
        incompat_flags,
        compat_flags,
        sequence,
        system_id,
        component_id,
        message_id,
        payload: Bytes::copy_from_slice(&src[header_len..checksum_at]),
        checksum,
        signature,
        message: None,
    };

    let entry = config.registry.get(message_id);
    match entry {
        Some(entry) => {
            let expected = frame.compute_checksum(entry.spec.crc_extra);
            if expected != checksum {
                src.advance(1);
                return Err(ParseError::ChecksumMismatch {
                    message_id,
                    expected,
                    found: checksum,
                });
            }
        }
        None if config.reject_unknown_messages => {
            src.advance(1);
            return Err(ParseError::UnknownMessageId(message_id));
        }
        None => {}
    }

    if let Some(verifier) = &config.verifier {
        if let Err(err) = verifier.verify(&frame) {
            src.advance(1);
            return Err(err);
        }
    }

    src.advance(total);
    frame.message = entry.map(|entry| entry.decode(&frame.payload));
    trace!(
        message_id,
        sequence,
        system_id,
        component_id,
        %version,
        known = frame.message.is_some(),
        "decoded frame"
    );
    Ok(Some(frame))
}
