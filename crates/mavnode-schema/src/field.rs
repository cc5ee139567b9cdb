use crc::{Crc, CRC_16_MCRF4XX};

/// X.25 checksum as used throughout MAVLink (CRC-16/MCRF4XX).
const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Wire type of a single message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Char,
    /// `uint8_t_mavlink_version`: a `u8` carrying the sender's protocol version.
    MavlinkVersion,
}

impl FieldType {
    /// Size of one element on the wire.
    pub const fn size(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Char | FieldType::MavlinkVersion => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }

    /// C type name used by the CRC_EXTRA derivation.
    pub const fn c_name(self) -> &'static str {
        match self {
            FieldType::U8 | FieldType::MavlinkVersion => "uint8_t",
            FieldType::I8 => "int8_t",
            FieldType::U16 => "uint16_t",
            FieldType::I16 => "int16_t",
            FieldType::U32 => "uint32_t",
            FieldType::I32 => "int32_t",
            FieldType::U64 => "uint64_t",
            FieldType::I64 => "int64_t",
            FieldType::F32 => "float",
            FieldType::F64 => "double",
            FieldType::Char => "char",
        }
    }
}

/// One field of a message layout, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// Element count for array fields, 0 for scalars.
    pub array_len: u8,
    /// MAVLink 2 extension field (absent from v1 payloads and CRC_EXTRA).
    pub extension: bool,
}

impl FieldSpec {
    /// A scalar base field.
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            array_len: 0,
            extension: false,
        }
    }

    /// Turn this field into a fixed-size array.
    pub const fn array(mut self, len: u8) -> Self {
        self.array_len = len;
        self
    }

    /// Mark this field as a MAVLink 2 extension.
    pub const fn extension(mut self) -> Self {
        self.extension = true;
        self
    }

    /// Bytes this field occupies on the wire.
    pub const fn wire_size(&self) -> usize {
        let count = if self.array_len == 0 {
            1
        } else {
            self.array_len as usize
        };
        self.ty.size() * count
    }
}

/// Derive the CRC_EXTRA seed for a message from its name and wire-ordered fields.
///
/// Extension fields do not take part, so adding extensions keeps the seed
/// stable across dialect revisions.
pub fn compute_crc_extra(name: &str, fields: &[FieldSpec]) -> u8 {
    let mut digest = X25.digest();
    digest.update(name.as_bytes());
    digest.update(b" ");
    for field in fields.iter().filter(|field| !field.extension) {
        digest.update(field.ty.c_name().as_bytes());
        digest.update(b" ");
        digest.update(field.name.as_bytes());
        digest.update(b" ");
        if field.array_len > 0 {
            digest.update(&[field.array_len]);
        }
    }
    let crc = digest.finalize();
    ((crc & 0xFF) ^ (crc >> 8)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25_check_value() {
        assert_eq!(X25.checksum(b"123456789"), 0x6F91);
    }

    #[test]
    fn heartbeat_seed() {
        let fields = [
            FieldSpec::new("custom_mode", FieldType::U32),
            FieldSpec::new("type", FieldType::U8),
            FieldSpec::new("autopilot", FieldType::U8),
            FieldSpec::new("base_mode", FieldType::U8),
            FieldSpec::new("system_status", FieldType::U8),
            FieldSpec::new("mavlink_version", FieldType::MavlinkVersion),
        ];
        assert_eq!(compute_crc_extra("HEARTBEAT", &fields), 50);
    }

    #[test]
    fn extensions_do_not_change_seed() {
        let base = [
            FieldSpec::new("command", FieldType::U16),
            FieldSpec::new("result", FieldType::U8),
        ];
        let extended = [
            base[0],
            base[1],
            FieldSpec::new("progress", FieldType::U8).extension(),
        ];
        assert_eq!(
            compute_crc_extra("COMMAND_ACK", &base),
            compute_crc_extra("COMMAND_ACK", &extended)
        );
        assert_eq!(compute_crc_extra("COMMAND_ACK", &base), 143);
    }

    #[test]
    fn array_wire_size() {
        let field = FieldSpec::new("data", FieldType::U16).array(4);
        assert_eq!(field.wire_size(), 8);
        assert_eq!(FieldSpec::new("x", FieldType::F64).wire_size(), 8);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn field_type_serde_names() {
        let json = serde_json::to_string(&FieldType::MavlinkVersion).unwrap();
        assert_eq!(json, "\"mavlink_version\"");
        let back: FieldType = serde_json::from_str("\"f32\"").unwrap();
        assert_eq!(back, FieldType::F32);
    }
}
