use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_MCRF4XX};
use mavnode_schema::Message;

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Start-of-frame marker for MAVLink 1.
pub const MAGIC_V1: u8 = 0xFE;
/// Start-of-frame marker for MAVLink 2.
pub const MAGIC_V2: u8 = 0xFD;

pub const V1_HEADER_LEN: usize = 6;
pub const V2_HEADER_LEN: usize = 10;
pub const CHECKSUM_LEN: usize = 2;
pub const SIGNATURE_LEN: usize = 13;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Incompat flag marking a signed v2 frame.
pub const INCOMPAT_SIGNED: u8 = 0x01;

/// Wire protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Version {
    V1,
    #[default]
    V2,
}

impl Version {
    pub const fn magic(self) -> u8 {
        match self {
            Version::V1 => MAGIC_V1,
            Version::V2 => MAGIC_V2,
        }
    }

    pub const fn header_len(self) -> usize {
        match self {
            Version::V1 => V1_HEADER_LEN,
            Version::V2 => V2_HEADER_LEN,
        }
    }

    /// Largest message id addressable in this version's header.
    pub const fn max_message_id(self) -> u32 {
        match self {
            Version::V1 => 0xFF,
            Version::V2 => 0x00FF_FFFF,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => f.write_str("MAVLink 1"),
            Version::V2 => f.write_str("MAVLink 2"),
        }
    }
}

/// System and component id of a frame's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    pub system_id: u8,
    pub component_id: u8,
}

impl Identity {
    pub const fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        // MAV_COMP_ID_MISSIONPLANNER on a typical ground station system id.
        Self::new(255, 190)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system_id, self.component_id)
    }
}

/// The 13-byte MAVLink 2 signing trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub link_id: u8,
    /// 48-bit timestamp in 10 µs units since 2015-01-01T00:00:00Z.
    pub timestamp: u64,
    pub signature: [u8; 6],
}

impl Signature {
    pub(crate) fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(self.link_id);
        dst.put_slice(&self.timestamp.to_le_bytes()[..6]);
        dst.put_slice(&self.signature);
    }

    pub(crate) fn parse(src: &[u8]) -> Self {
        let mut ts = [0u8; 8];
        ts[..6].copy_from_slice(&src[1..7]);
        let mut signature = [0u8; 6];
        signature.copy_from_slice(&src[7..13]);
        Self {
            link_id: src[0],
            timestamp: u64::from_le_bytes(ts),
            signature,
        }
    }
}

/// One wire frame.
///
/// Decoded frames keep the exact header, payload and checksum that arrived, so
/// [`Frame::to_bytes`] reproduces the received bytes and a frame can be relayed
/// untouched. `message` is `None` when the id is not in the registry.
#[derive(Debug, Clone)]
pub struct Frame {
    pub version: Version,
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
    pub payload: Bytes,
    pub checksum: u16,
    pub signature: Option<Signature>,
    pub message: Option<Box<dyn Message>>,
}

impl Frame {
    pub fn source(&self) -> Identity {
        Identity::new(self.system_id, self.component_id)
    }

    pub fn is_signed(&self) -> bool {
        self.version == Version::V2 && self.incompat_flags & INCOMPAT_SIGNED != 0
    }

    /// Borrow the decoded message as a concrete type.
    pub fn message_as<T: Message>(&self) -> Option<&T> {
        self.message.as_deref()?.downcast_ref::<T>()
    }

    /// Mutably borrow the decoded message as a concrete type.
    ///
    /// Changing the message does not touch `payload` or `checksum`; the frame
    /// has to be fixed before it is written again.
    pub fn message_as_mut<T: Message>(&mut self) -> Option<&mut T> {
        self.message.as_deref_mut()?.downcast_mut::<T>()
    }

    /// Bytes this frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        let trailer = if self.signature.is_some() {
            SIGNATURE_LEN
        } else {
            0
        };
        self.version.header_len() + self.payload.len() + CHECKSUM_LEN + trailer
    }

    /// Header bytes, magic included.
    pub(crate) fn header(&self) -> ([u8; V2_HEADER_LEN], usize) {
        let mut buf = [0u8; V2_HEADER_LEN];
        let len = self.payload.len() as u8;
        match self.version {
            Version::V1 => {
                buf[..V1_HEADER_LEN].copy_from_slice(&[
                    MAGIC_V1,
                    len,
                    self.sequence,
                    self.system_id,
                    self.component_id,
                    self.message_id as u8,
                ]);
                (buf, V1_HEADER_LEN)
            }
            Version::V2 => {
                let id = self.message_id.to_le_bytes();
                buf = [
                    MAGIC_V2,
                    len,
                    self.incompat_flags,
                    self.compat_flags,
                    self.sequence,
                    self.system_id,
                    self.component_id,
                    id[0],
                    id[1],
                    id[2],
                ];
                (buf, V2_HEADER_LEN)
            }
        }
    }

    /// X.25 checksum over the header (magic excluded), payload and `crc_extra`.
    pub fn compute_checksum(&self, crc_extra: u8) -> u16 {
        let (header, len) = self.header();
        let mut digest = X25.digest();
        digest.update(&header[1..len]);
        digest.update(&self.payload);
        digest.update(&[crc_extra]);
        digest.finalize()
    }

    /// Append the wire encoding of this frame to `dst`, exactly as stored.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        let (header, len) = self.header();
        dst.reserve(self.wire_size());
        dst.put_slice(&header[..len]);
        dst.put_slice(&self.payload);
        dst.put_u16_le(self.checksum);
        if let Some(signature) = &self.signature {
            signature.put(dst);
        }
    }

    /// The wire encoding of this frame.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode_to(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn version_and_identity_serde_shape() {
        assert_eq!(serde_json::to_string(&Version::V1).unwrap(), r#""v1""#);
        let version: Version = serde_json::from_str(r#""v2""#).unwrap();
        assert_eq!(version, Version::V2);

        let identity: Identity =
            serde_json::from_str(r#"{"system_id":1,"component_id":191}"#).unwrap();
        assert_eq!(identity, Identity::new(1, 191));
        assert!(serde_json::from_str::<Version>(r#""v3""#).is_err());
    }

    #[test]
    fn x25_check_value() {
        assert_eq!(X25.checksum(b"123456789"), 0x6F91);
    }

    #[test]
    fn signature_trailer_layout() {
        let sig = Signature {
            link_id: 5,
            timestamp: 0x0000_0102_0304_0506,
            signature: [0xAA; 6],
        };
        let mut buf = BytesMut::new();
        sig.put(&mut buf);
        assert_eq!(buf.len(), SIGNATURE_LEN);
        assert_eq!(&buf[..7], &[5, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(Signature::parse(&buf), sig);
    }

    #[test]
    fn v2_header_packs_24_bit_id() {
        let frame = Frame {
            version: Version::V2,
            incompat_flags: 0,
            compat_flags: 0,
            sequence: 1,
            system_id: 2,
            component_id: 3,
            message_id: 0x0A0B0C,
            payload: Bytes::from_static(&[1]),
            checksum: 0,
            signature: None,
            message: None,
        };
        let (header, len) = frame.header();
        assert_eq!(len, V2_HEADER_LEN);
        assert_eq!(&header[7..10], &[0x0C, 0x0B, 0x0A]);
        assert_eq!(frame.wire_size(), 13);
    }

    #[test]
    fn version_display_and_limits() {
        assert_eq!(Version::V1.to_string(), "MAVLink 1");
        assert_eq!(Version::V1.max_message_id(), 255);
        assert_eq!(Version::default(), Version::V2);
    }
}
