use std::sync::Arc;
use std::time::Duration;

use mavnode_frame::{Identity, SigningKey, Version};
use mavnode_schema::common::{MAVLINK_VERSION, MAV_AUTOPILOT_INVALID, MAV_STATE_ACTIVE, MAV_TYPE_GCS};
use mavnode_schema::{common, DialectRegistry};

/// Signing setup of a node.
#[derive(Debug, Clone, Default)]
pub struct SigningConfig {
    /// Key used to sign outgoing MAVLink 2 frames.
    pub out_key: Option<SigningKey>,
    /// Link id written into outgoing signatures.
    pub link_id: u8,
    /// Keys accepted on incoming frames. Empty disables verification.
    pub in_keys: Vec<SigningKey>,
    /// Accept unsigned frames even when `in_keys` is set.
    pub allow_unsigned: bool,
}

impl SigningConfig {
    /// Sign outgoing frames and accept only frames signed with the same key.
    pub fn shared(key: SigningKey) -> Self {
        Self {
            out_key: Some(key.clone()),
            in_keys: vec![key],
            ..Self::default()
        }
    }

    pub fn with_link_id(mut self, link_id: u8) -> Self {
        self.link_id = link_id;
        self
    }

    pub fn with_allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }
}

/// Periodic HEARTBEAT emitted by the node itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HeartbeatConfig {
    pub period: Duration,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: u8,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            mav_type: MAV_TYPE_GCS,
            autopilot: MAV_AUTOPILOT_INVALID,
            base_mode: 0,
            custom_mode: 0,
            system_status: MAV_STATE_ACTIVE,
        }
    }
}

impl HeartbeatConfig {
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub(crate) fn message(&self) -> common::Heartbeat {
        common::Heartbeat {
            custom_mode: self.custom_mode,
            mav_type: self.mav_type,
            autopilot: self.autopilot,
            base_mode: self.base_mode,
            system_status: self.system_status,
            mavlink_version: MAVLINK_VERSION,
        }
    }
}

/// Configuration for a [`crate::Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// System and component id stamped on self-originated frames.
    pub identity: Identity,
    /// Wire version of self-originated frames.
    pub out_version: Version,
    /// Messages the node can encode and decode.
    pub registry: Arc<DialectRegistry>,
    pub signing: SigningConfig,
    /// `None` disables the heartbeat emitter.
    pub heartbeat: Option<HeartbeatConfig>,
    /// Drop frames with ids missing from the registry instead of passing them through.
    pub reject_unknown_messages: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            out_version: Version::V2,
            registry: Arc::new(common::registry()),
            signing: SigningConfig::default(),
            heartbeat: None,
            reject_unknown_messages: false,
        }
    }
}

impl NodeConfig {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn with_out_version(mut self, version: Version) -> Self {
        self.out_version = version;
        self
    }

    pub fn with_registry(mut self, registry: Arc<DialectRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_signing(mut self, signing: SigningConfig) -> Self {
        self.signing = signing;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn with_reject_unknown_messages(mut self, reject: bool) -> Self {
        self.reject_unknown_messages = reject;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.signing.out_key.is_some() && self.out_version == Version::V1 {
            return Err("signing requires MAVLink 2 output".to_string());
        }
        if self.heartbeat.as_ref().is_some_and(|hb| hb.period.is_zero()) {
            return Err("heartbeat period must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.out_version, Version::V2);
        assert!(cfg.heartbeat.is_none());
        assert!(cfg.registry.contains(0));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn v1_signing_rejected() {
        let cfg = NodeConfig::new(Identity::new(1, 1))
            .with_out_version(Version::V1)
            .with_signing(SigningConfig::shared(SigningKey::from_passphrase("k")));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_period_rejected() {
        let cfg = NodeConfig::default()
            .with_heartbeat(HeartbeatConfig::default().with_period(Duration::ZERO));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn heartbeat_message_fields() {
        let hb = HeartbeatConfig::default().message();
        assert_eq!((hb.mav_type, hb.autopilot, hb.system_status), (6, 8, 4));
        assert_eq!(hb.mavlink_version, 3);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn heartbeat_config_from_json() {
        let cfg: HeartbeatConfig =
            serde_json::from_str(r#"{"period":{"secs":1,"nanos":0},"mav_type":2}"#).unwrap();
        assert_eq!(cfg.period, Duration::from_secs(1));
        assert_eq!(cfg.mav_type, 2);
        assert_eq!(cfg.autopilot, MAV_AUTOPILOT_INVALID);
    }
}
