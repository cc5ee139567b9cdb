use std::any::Any;
use std::fmt;

use bytes::BytesMut;

use crate::field::FieldSpec;
use crate::payload::{PayloadReader, PayloadWriter};
use crate::registry::MessageSpec;

/// A decoded, typed MAVLink message.
///
/// Frames carry messages as `Box<dyn Message>` so one node can handle any
/// dialect the registry knows about. `downcast_ref` gets the concrete type back.
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// Message id.
    fn id(&self) -> u32;

    /// Upper-case message name, e.g. `HEARTBEAT`.
    fn name(&self) -> &'static str;

    /// Append the full, untrimmed payload (extensions included) in wire order.
    fn encode_payload(&self, dst: &mut BytesMut);

    fn clone_message(&self) -> Box<dyn Message>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Message {
    /// Borrow as the concrete message type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow as the concrete message type.
    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// True when the message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Clone for Box<dyn Message> {
    fn clone(&self) -> Self {
        self.clone_message()
    }
}

/// Static description and field codec of a concrete message struct.
///
/// Implementing this trait is all a message type needs; [`Message`] follows
/// from a blanket implementation.
pub trait MessageData: Clone + fmt::Debug + Default + Send + Sync + 'static {
    const ID: u32;
    const NAME: &'static str;
    const CRC_EXTRA: u8;
    /// Wire-ordered layout, extensions last.
    const FIELDS: &'static [FieldSpec];

    /// Write every field, extensions included, in wire order.
    fn write_fields(&self, w: &mut PayloadWriter<'_>);

    /// Read every field in wire order; missing bytes read as zero.
    fn read_fields(r: &mut PayloadReader<'_>) -> Self;

    /// Decode from a possibly trimmed payload.
    fn decode(payload: &[u8]) -> Self {
        Self::read_fields(&mut PayloadReader::new(payload))
    }

    /// Registry entry for this type.
    fn spec() -> MessageSpec {
        MessageSpec {
            id: Self::ID,
            name: Self::NAME,
            crc_extra: Self::CRC_EXTRA,
            fields: Self::FIELDS,
            decode: decode_boxed::<Self>,
        }
    }
}

fn decode_boxed<T: MessageData>(payload: &[u8]) -> Box<dyn Message> {
    Box::new(T::decode(payload))
}

impl<T: MessageData> Message for T {
    fn id(&self) -> u32 {
        T::ID
    }

    fn name(&self) -> &'static str {
        T::NAME
    }

    fn encode_payload(&self, dst: &mut BytesMut) {
        self.write_fields(&mut PayloadWriter::new(dst));
    }

    fn clone_message(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
