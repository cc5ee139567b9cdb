//! Messages the session layer depends on.
//!
//! A small, hand-written slice of the `common` dialect: HEARTBEAT for presence
//! and the command microservice (COMMAND_INT, COMMAND_LONG, COMMAND_ACK).
//! Field layouts and CRC_EXTRA seeds match the upstream XML definitions.

use std::fmt;

use crate::field::{FieldSpec, FieldType};
use crate::message::MessageData;
use crate::payload::{PayloadReader, PayloadWriter};
use crate::registry::DialectRegistry;

/// Registry holding every message in this module.
pub fn registry() -> DialectRegistry {
    let mut registry = DialectRegistry::new();
    for spec in [
        Heartbeat::spec(),
        CommandInt::spec(),
        CommandLong::spec(),
        CommandAck::spec(),
    ] {
        if let Err(err) = registry.register(spec) {
            tracing::error!(%err, "built-in message spec rejected");
        }
    }
    registry
}

/// `MAV_TYPE_GCS`.
pub const MAV_TYPE_GCS: u8 = 6;
/// `MAV_AUTOPILOT_INVALID`: the sender is not a flight controller.
pub const MAV_AUTOPILOT_INVALID: u8 = 8;
/// `MAV_STATE_ACTIVE`.
pub const MAV_STATE_ACTIVE: u8 = 4;
/// Value of HEARTBEAT `mavlink_version` for MAVLink 2 capable senders.
pub const MAVLINK_VERSION: u8 = 3;

/// Selected `MAV_CMD` ids.
pub mod mav_cmd {
    pub const NAV_RETURN_TO_LAUNCH: u16 = 20;
    pub const NAV_LAND: u16 = 21;
    pub const NAV_TAKEOFF: u16 = 22;
    pub const DO_SET_MODE: u16 = 176;
    pub const PREFLIGHT_CALIBRATION: u16 = 241;
    pub const COMPONENT_ARM_DISARM: u16 = 400;
    pub const SET_MESSAGE_INTERVAL: u16 = 511;
    pub const REQUEST_MESSAGE: u16 = 512;
}

/// `MAV_RESULT` value carried by COMMAND_ACK.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MavResult(pub u8);

impl MavResult {
    pub const ACCEPTED: MavResult = MavResult(0);
    pub const TEMPORARILY_REJECTED: MavResult = MavResult(1);
    pub const DENIED: MavResult = MavResult(2);
    pub const UNSUPPORTED: MavResult = MavResult(3);
    pub const FAILED: MavResult = MavResult(4);
    pub const IN_PROGRESS: MavResult = MavResult(5);
    pub const CANCELLED: MavResult = MavResult(6);
    pub const COMMAND_LONG_ONLY: MavResult = MavResult(7);
    pub const COMMAND_INT_ONLY: MavResult = MavResult(8);
    pub const COMMAND_UNSUPPORTED_MAV_FRAME: MavResult = MavResult(9);

    /// Upstream enum entry name, or `None` for values this crate does not know.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::ACCEPTED => "MAV_RESULT_ACCEPTED",
            Self::TEMPORARILY_REJECTED => "MAV_RESULT_TEMPORARILY_REJECTED",
            Self::DENIED => "MAV_RESULT_DENIED",
            Self::UNSUPPORTED => "MAV_RESULT_UNSUPPORTED",
            Self::FAILED => "MAV_RESULT_FAILED",
            Self::IN_PROGRESS => "MAV_RESULT_IN_PROGRESS",
            Self::CANCELLED => "MAV_RESULT_CANCELLED",
            Self::COMMAND_LONG_ONLY => "MAV_RESULT_COMMAND_LONG_ONLY",
            Self::COMMAND_INT_ONLY => "MAV_RESULT_COMMAND_INT_ONLY",
            Self::COMMAND_UNSUPPORTED_MAV_FRAME => "MAV_RESULT_COMMAND_UNSUPPORTED_MAV_FRAME",
            _ => return None,
        })
    }
}

impl fmt::Debug for MavResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "MavResult({})", self.0),
        }
    }
}

impl fmt::Display for MavResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// HEARTBEAT (#0).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

impl MessageData for Heartbeat {
    const ID: u32 = 0;
    const NAME: &'static str = "HEARTBEAT";
    const CRC_EXTRA: u8 = 50;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("custom_mode", FieldType::U32),
        FieldSpec::new("type", FieldType::U8),
        FieldSpec::new("autopilot", FieldType::U8),
        FieldSpec::new("base_mode", FieldType::U8),
        FieldSpec::new("system_status", FieldType::U8),
        FieldSpec::new("mavlink_version", FieldType::MavlinkVersion),
    ];

    fn write_fields(&self, w: &mut PayloadWriter<'_>) {
        w.put_u32(self.custom_mode);
        w.put_u8(self.mav_type);
        w.put_u8(self.autopilot);
        w.put_u8(self.base_mode);
        w.put_u8(self.system_status);
        w.put_u8(self.mavlink_version);
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            custom_mode: r.u32(),
            mav_type: r.u8(),
            autopilot: r.u8(),
            base_mode: r.u8(),
            system_status: r.u8(),
            mavlink_version: r.u8(),
        }
    }
}

/// COMMAND_INT (#75).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandInt {
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub frame: u8,
    pub current: u8,
    pub autocontinue: u8,
}

impl MessageData for CommandInt {
    const ID: u32 = 75;
    const NAME: &'static str = "COMMAND_INT";
    const CRC_EXTRA: u8 = 158;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("param1", FieldType::F32),
        FieldSpec::new("param2", FieldType::F32),
        FieldSpec::new("param3", FieldType::F32),
        FieldSpec::new("param4", FieldType::F32),
        FieldSpec::new("x", FieldType::I32),
        FieldSpec::new("y", FieldType::I32),
        FieldSpec::new("z", FieldType::F32),
        FieldSpec::new("command", FieldType::U16),
        FieldSpec::new("target_system", FieldType::U8),
        FieldSpec::new("target_component", FieldType::U8),
        FieldSpec::new("frame", FieldType::U8),
        FieldSpec::new("current", FieldType::U8),
        FieldSpec::new("autocontinue", FieldType::U8),
    ];

    fn write_fields(&self, w: &mut PayloadWriter<'_>) {
        w.put_f32(self.param1);
        w.put_f32(self.param2);
        w.put_f32(self.param3);
        w.put_f32(self.param4);
        w.put_i32(self.x);
        w.put_i32(self.y);
        w.put_f32(self.z);
        w.put_u16(self.command);
        w.put_u8(self.target_system);
        w.put_u8(self.target_component);
        w.put_u8(self.frame);
        w.put_u8(self.current);
        w.put_u8(self.autocontinue);
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            param1: r.f32(),
            param2: r.f32(),
            param3: r.f32(),
            param4: r.f32(),
            x: r.i32(),
            y: r.i32(),
            z: r.f32(),
            command: r.u16(),
            target_system: r.u8(),
            target_component: r.u8(),
            frame: r.u8(),
            current: r.u8(),
            autocontinue: r.u8(),
        }
    }
}

/// COMMAND_LONG (#76).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    /// Incremented on each retransmission of the same command.
    pub confirmation: u8,
}

impl CommandLong {
    /// A command addressed to `(target_system, target_component)` with all params zero.
    pub fn new(target_system: u8, target_component: u8, command: u16) -> Self {
        Self {
            command,
            target_system,
            target_component,
            ..Self::default()
        }
    }

    /// Set `param1..=param7` (1-based `index`). Out-of-range indices are ignored.
    pub fn with_param(mut self, index: usize, value: f32) -> Self {
        if let Some(slot) = index.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            *slot = value;
        }
        self
    }
}

impl MessageData for CommandLong {
    const ID: u32 = 76;
    const NAME: &'static str = "COMMAND_LONG";
    const CRC_EXTRA: u8 = 152;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("param1", FieldType::F32),
        FieldSpec::new("param2", FieldType::F32),
        FieldSpec::new("param3", FieldType::F32),
        FieldSpec::new("param4", FieldType::F32),
        FieldSpec::new("param5", FieldType::F32),
        FieldSpec::new("param6", FieldType::F32),
        FieldSpec::new("param7", FieldType::F32),
        FieldSpec::new("command", FieldType::U16),
        FieldSpec::new("target_system", FieldType::U8),
        FieldSpec::new("target_component", FieldType::U8),
        FieldSpec::new("confirmation", FieldType::U8),
    ];

    fn write_fields(&self, w: &mut PayloadWriter<'_>) {
        for param in self.params {
            w.put_f32(param);
        }
        w.put_u16(self.command);
        w.put_u8(self.target_system);
        w.put_u8(self.target_component);
        w.put_u8(self.confirmation);
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        let mut params = [0f32; 7];
        for param in &mut params {
            *param = r.f32();
        }
        Self {
            params,
            command: r.u16(),
            target_system: r.u8(),
            target_component: r.u8(),
            confirmation: r.u8(),
        }
    }
}

/// COMMAND_ACK (#77).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandAck {
    pub command: u16,
    pub result: MavResult,
    /// Extension: completion percentage while `IN_PROGRESS` (255 = unknown).
    pub progress: u8,
    /// Extension: command-specific detail for the result.
    pub result_param2: i32,
    /// Extension: system that sent the command being acknowledged.
    pub target_system: u8,
    /// Extension: component that sent the command being acknowledged.
    pub target_component: u8,
}

impl MessageData for CommandAck {
    const ID: u32 = 77;
    const NAME: &'static str = "COMMAND_ACK";
    const CRC_EXTRA: u8 = 143;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("command", FieldType::U16),
        FieldSpec::new("result", FieldType::U8),
        FieldSpec::new("progress", FieldType::U8).extension(),
        FieldSpec::new("result_param2", FieldType::I32).extension(),
        FieldSpec::new("target_system", FieldType::U8).extension(),
        FieldSpec::new("target_component", FieldType::U8).extension(),
    ];

    fn write_fields(&self, w: &mut PayloadWriter<'_>) {
        w.put_u16(self.command);
        w.put_u8(self.result.0);
        w.put_u8(self.progress);
        w.put_i32(self.result_param2);
        w.put_u8(self.target_system);
        w.put_u8(self.target_component);
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            command: r.u16(),
            result: MavResult(r.u8()),
            progress: r.u8(),
            result_param2: r.i32(),
            target_system: r.u8(),
            target_component: r.u8(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::field::compute_crc_extra;
    use crate::message::Message;

    fn assert_seed<T: MessageData>() {
        assert_eq!(
            compute_crc_extra(T::NAME, T::FIELDS),
            T::CRC_EXTRA,
            "{}",
            T::NAME
        );
    }

    #[test]
    fn declared_seeds_match_layouts() {
        assert_seed::<Heartbeat>();
        assert_seed::<CommandInt>();
        assert_seed::<CommandLong>();
        assert_seed::<CommandAck>();
    }

    #[test]
    fn registry_contains_all_builtins() {
        let registry = registry();
        assert_eq!(registry.ids(), vec![0, 75, 76, 77]);
        assert_eq!(registry.get(Heartbeat::ID).unwrap().max_len, 9);
        assert_eq!(registry.get(CommandInt::ID).unwrap().max_len, 35);
        assert_eq!(registry.get(CommandLong::ID).unwrap().max_len, 33);
    }

    #[test]
    fn command_long_payload_layout() {
        let cmd = CommandLong::new(1, 1, mav_cmd::COMPONENT_ARM_DISARM).with_param(1, 1.0);
        let mut buf = BytesMut::new();
        cmd.encode_payload(&mut buf);

        assert_eq!(buf.len(), 33);
        assert_eq!(&buf[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&buf[28..30], &400u16.to_le_bytes());
        assert_eq!(&buf[30..32], &[1, 1]);
        assert_eq!(CommandLong::decode(&buf), cmd);
    }

    #[test]
    fn with_param_ignores_out_of_range() {
        let cmd = CommandLong::new(1, 1, 0).with_param(0, 9.0).with_param(8, 9.0);
        assert_eq!(cmd.params, [0.0; 7]);
    }

    #[test]
    fn ack_without_extensions_decodes_zeroed() {
        let ack = CommandAck::decode(&[0x90, 0x01, 0x00]);
        assert_eq!(ack.command, 400);
        assert_eq!(ack.result, MavResult::ACCEPTED);
        assert_eq!(ack.progress, 0);
        assert_eq!(ack.target_system, 0);
    }

    #[test]
    fn mav_result_names() {
        assert_eq!(MavResult::IN_PROGRESS.name(), Some("MAV_RESULT_IN_PROGRESS"));
        assert_eq!(format!("{:?}", MavResult(42)), "MavResult(42)");
    }
}
