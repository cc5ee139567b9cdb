/// Errors raised while building a dialect registry.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two specs share the same message id.
    #[error("duplicate message id {id} ({existing} and {incoming})")]
    DuplicateId {
        id: u32,
        existing: &'static str,
        incoming: &'static str,
    },

    /// The message id does not fit in 24 bits.
    #[error("message id {0} exceeds the 24-bit id space")]
    IdOutOfRange(u32),

    /// The declared CRC_EXTRA seed does not match the field layout.
    #[error("crc_extra mismatch for {name}: declared {declared}, computed {computed}")]
    CrcExtraMismatch {
        name: &'static str,
        declared: u8,
        computed: u8,
    },

    /// The field layout does not fit in a single frame.
    #[error("payload of {name} too long ({len} bytes, max 255)")]
    PayloadTooLong { name: &'static str, len: usize },

    /// No spec registered for the id.
    #[error("no message registered for id {0}")]
    UnknownMessage(u32),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
