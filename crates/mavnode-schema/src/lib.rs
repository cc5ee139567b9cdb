//! MAVLink message schema contract.
//!
//! The frame codec never inspects message structs at runtime. Instead every
//! message type contributes a [`MessageSpec`]: its id, wire-ordered field
//! layout, CRC_EXTRA seed and a decode function. Specs are collected once into
//! a [`DialectRegistry`] which is then shared, immutable, by everything that
//! needs to encode or decode frames.
//!
//! The [`common`] module carries the handful of messages the session layer
//! itself relies on (heartbeats and the command protocol). Full dialects are
//! expected to be generated elsewhere and registered the same way.

pub mod common;
pub mod config;
pub mod error;
pub mod field;
pub mod message;
pub mod payload;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use field::{compute_crc_extra, FieldSpec, FieldType};
pub use message::{Message, MessageData};
pub use payload::{PayloadReader, PayloadWriter};
pub use registry::{DecodeFn, DialectRegistry, MessageSpec, RegisteredMessage, MAX_MESSAGE_ID};
