use std::collections::HashMap;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::field::{compute_crc_extra, FieldSpec};
use crate::message::{Message, MessageData};

/// Largest message id representable in a MAVLink 2 header.
pub const MAX_MESSAGE_ID: u32 = 0x00FF_FFFF;

/// Largest payload a frame can carry.
const MAX_PAYLOAD_LEN: usize = 255;

/// Builds a typed message from a (possibly trimmed) payload.
pub type DecodeFn = fn(&[u8]) -> Box<dyn Message>;

/// Schema contract for one message type.
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    pub id: u32,
    pub name: &'static str,
    pub crc_extra: u8,
    /// Wire-ordered layout, extensions last.
    pub fields: &'static [FieldSpec],
    pub decode: DecodeFn,
}

impl MessageSpec {
    /// Payload length without extensions (the MAVLink 1 length).
    pub fn base_len(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| !field.extension)
            .map(FieldSpec::wire_size)
            .sum()
    }

    /// Payload length with every extension present.
    pub fn max_len(&self) -> usize {
        self.fields.iter().map(FieldSpec::wire_size).sum()
    }
}

/// A registered spec with its lengths precomputed.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredMessage {
    pub spec: MessageSpec,
    pub base_len: usize,
    pub max_len: usize,
}

impl RegisteredMessage {
    /// Decode a payload into its typed message.
    pub fn decode(&self, payload: &[u8]) -> Box<dyn Message> {
        (self.spec.decode)(payload)
    }
}

/// Id-keyed table of message specs.
///
/// Build it once at startup, wrap it in an `Arc`, and hand it to the frame
/// codec and node. Nothing mutates it after that.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    messages: HashMap<u32, RegisteredMessage>,
    config: RegistryConfig,
}

impl DialectRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            messages: HashMap::new(),
            config,
        }
    }

    /// Build a registry from a list of specs.
    pub fn from_specs(specs: &[MessageSpec]) -> Result<Self> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(*spec)?;
        }
        Ok(registry)
    }

    /// Register one spec.
    pub fn register(&mut self, spec: MessageSpec) -> Result<()> {
        if spec.id > MAX_MESSAGE_ID {
            return Err(SchemaError::IdOutOfRange(spec.id));
        }

        let max_len = spec.max_len();
        if max_len > MAX_PAYLOAD_LEN {
            return Err(SchemaError::PayloadTooLong {
                name: spec.name,
                len: max_len,
            });
        }

        if self.config.verify_crc_extra {
            let computed = compute_crc_extra(spec.name, spec.fields);
            if computed != spec.crc_extra {
                return Err(SchemaError::CrcExtraMismatch {
                    name: spec.name,
                    declared: spec.crc_extra,
                    computed,
                });
            }
        }

        if let Some(existing) = self.messages.get(&spec.id) {
            if !self.config.allow_override {
                return Err(SchemaError::DuplicateId {
                    id: spec.id,
                    existing: existing.spec.name,
                    incoming: spec.name,
                });
            }
            debug!(id = spec.id, name = spec.name, "overriding message spec");
        }

        self.messages.insert(
            spec.id,
            RegisteredMessage {
                spec,
                base_len: spec.base_len(),
                max_len,
            },
        );
        Ok(())
    }

    /// Register a concrete message type.
    pub fn register_message<T: MessageData>(&mut self) -> Result<()> {
        self.register(T::spec())
    }

    /// Add every spec of `other` to this registry.
    pub fn merge(&mut self, other: &DialectRegistry) -> Result<()> {
        let mut ids: Vec<u32> = other.messages.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(entry) = other.messages.get(&id) {
                self.register(entry.spec)?;
            }
        }
        Ok(())
    }

    /// Look up a message by id.
    pub fn get(&self, id: u32) -> Option<&RegisteredMessage> {
        self.messages.get(&id)
    }

    /// Look up a message by id, failing when unknown.
    pub fn require(&self, id: u32) -> Result<&RegisteredMessage> {
        self.get(id).ok_or(SchemaError::UnknownMessage(id))
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: u32) -> bool {
        self.messages.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{self, CommandAck, CommandLong, Heartbeat};
    use crate::field::FieldType;

    static BAD_FIELDS: [FieldSpec; 1] = [FieldSpec::new("value", FieldType::U8)];

    fn bad_spec(id: u32, crc_extra: u8) -> MessageSpec {
        MessageSpec {
            id,
            name: "BAD",
            crc_extra,
            fields: &BAD_FIELDS,
            decode: |payload| Box::new(Heartbeat::decode(payload)),
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = DialectRegistry::new();
        registry.register_message::<Heartbeat>().unwrap();
        registry.register_message::<CommandAck>().unwrap();

        assert!(registry.contains(Heartbeat::ID));
        assert_eq!(registry.ids(), vec![0, 77]);

        let ack = registry.get(CommandAck::ID).unwrap();
        assert_eq!(ack.base_len, 3);
        assert_eq!(ack.max_len, 10);
        assert_eq!(ack.spec.crc_extra, 143);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut registry = DialectRegistry::new();
        registry.register_message::<Heartbeat>().unwrap();
        let err = registry.register_message::<Heartbeat>().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateId { id: 0, .. }));
    }

    #[test]
    fn duplicate_id_allowed_with_override() {
        let mut registry = DialectRegistry::with_config(RegistryConfig {
            allow_override: true,
            ..RegistryConfig::default()
        });
        registry.register_message::<Heartbeat>().unwrap();
        registry.register_message::<Heartbeat>().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn crc_extra_mismatch_rejected() {
        let computed = compute_crc_extra("BAD", &BAD_FIELDS);
        let mut registry = DialectRegistry::new();
        let err = registry
            .register(bad_spec(9000, computed.wrapping_add(1)))
            .unwrap_err();
        assert!(matches!(err, SchemaError::CrcExtraMismatch { .. }));

        registry.register(bad_spec(9000, computed)).unwrap();
    }

    #[test]
    fn crc_extra_check_can_be_disabled() {
        let mut registry = DialectRegistry::with_config(RegistryConfig {
            verify_crc_extra: false,
            ..RegistryConfig::default()
        });
        registry.register(bad_spec(9001, 0)).unwrap();
    }

    #[test]
    fn id_out_of_range_rejected() {
        let mut registry = DialectRegistry::new();
        let err = registry.register(bad_spec(MAX_MESSAGE_ID + 1, 0)).unwrap_err();
        assert!(matches!(err, SchemaError::IdOutOfRange(_)));
    }

    #[test]
    fn merge_combines_dialects() {
        let mut left = DialectRegistry::new();
        left.register_message::<Heartbeat>().unwrap();
        let mut right = DialectRegistry::new();
        right.register_message::<CommandLong>().unwrap();

        left.merge(&right).unwrap();
        assert_eq!(left.ids(), vec![0, 76]);
        assert!(left.merge(&common::registry()).is_err());
    }

    #[test]
    fn require_unknown_id() {
        let registry = common::registry();
        assert!(matches!(
            registry.require(424242),
            Err(SchemaError::UnknownMessage(424242))
        ));
    }
}
