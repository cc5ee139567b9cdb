//! MAVLink 2 message signing.
//!
//! A signature is the first 6 bytes of
//! `SHA-256(key ‖ header ‖ payload ‖ checksum ‖ link_id ‖ timestamp)`, where the
//! header includes the start marker and the timestamp counts 10 µs ticks since
//! 2015-01-01T00:00:00Z. Receivers keep the last accepted timestamp per sender
//! and drop anything that is not strictly newer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::error::ParseError;
use crate::frame::{Frame, Identity, Signature};

pub const KEY_LEN: usize = 32;

/// 2015-01-01T00:00:00Z as a Unix timestamp.
const SIGNING_EPOCH_UNIX_SECS: u64 = 1_420_070_400;

const TIMESTAMP_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Current time in signing timestamp units.
pub fn timestamp_now() -> u64 {
    let ticks = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| (elapsed.as_micros() / 10) as u64)
        .unwrap_or(0);
    ticks.saturating_sub(SIGNING_EPOCH_UNIX_SECS * 100_000) & TIMESTAMP_MASK
}

/// A 32-byte shared signing secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey([u8; KEY_LEN]);

impl SigningKey {
    /// Use raw key material, zero-padded or truncated to 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut key = [0u8; KEY_LEN];
        let n = bytes.len().min(KEY_LEN);
        key[..n].copy_from_slice(&bytes[..n]);
        Self(key)
    }

    /// Derive a key from a passphrase with SHA-256, the way ground stations do.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self::from_bytes(&digest)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Compute the 6-byte signature of a v2 frame for the given link and timestamp.
    pub fn sign(&self, frame: &Frame, link_id: u8, timestamp: u64) -> [u8; 6] {
        let (header, len) = frame.header();
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(&header[..len]);
        hasher.update(&frame.payload);
        hasher.update(frame.checksum.to_le_bytes());
        hasher.update([link_id]);
        hasher.update(&timestamp.to_le_bytes()[..6]);
        let digest = hasher.finalize();

        let mut out = [0u8; 6];
        out.copy_from_slice(&digest[..6]);
        out
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Signs outgoing frames with one key and link id.
///
/// Timestamps handed out by one signer are strictly increasing, even when
/// several frames are signed within the same 10 µs tick.
#[derive(Debug)]
pub struct Signer {
    key: SigningKey,
    link_id: u8,
    last_timestamp: AtomicU64,
}

impl Signer {
    pub fn new(key: SigningKey, link_id: u8) -> Self {
        Self {
            key,
            link_id,
            last_timestamp: AtomicU64::new(0),
        }
    }

    pub fn link_id(&self) -> u8 {
        self.link_id
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// Next timestamp: the current time, or one tick after the previous one.
    pub fn next_timestamp(&self) -> u64 {
        let now = timestamp_now();
        let mut last = self.last_timestamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1) & TIMESTAMP_MASK;
            match self.last_timestamp.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Sign a frame whose header and checksum are final.
    pub fn sign(&self, frame: &Frame) -> Signature {
        self.sign_at(frame, self.next_timestamp())
    }

    /// Sign with an explicit timestamp.
    pub fn sign_at(&self, frame: &Frame, timestamp: u64) -> Signature {
        Signature {
            link_id: self.link_id,
            timestamp,
            signature: self.key.sign(frame, self.link_id, timestamp),
        }
    }
}

/// Checks incoming signatures and enforces replay protection.
///
/// One verifier is shared by every channel of a node, so a frame replayed on a
/// different link than the original is still caught.
#[derive(Debug)]
pub struct Verifier {
    keys: Vec<SigningKey>,
    allow_unsigned: bool,
    last_accepted: Mutex<HashMap<Identity, u64>>,
}

impl Verifier {
    /// Accept frames signed by any of `keys`. Unsigned frames are rejected.
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self {
            keys,
            allow_unsigned: false,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Also accept unsigned (and v1) frames.
    pub fn with_allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }

    pub fn allows_unsigned(&self) -> bool {
        self.allow_unsigned
    }

    /// Last accepted timestamp for a sender.
    pub fn last_timestamp(&self, sender: Identity) -> Option<u64> {
        self.table().get(&sender).copied()
    }

    /// Check a decoded frame. On success the sender's timestamp is recorded.
    pub fn verify(&self, frame: &Frame) -> Result<(), ParseError> {
        let sender = frame.source();
        let signature = match (&frame.signature, frame.is_signed()) {
            (Some(signature), true) => signature,
            _ if self.allow_unsigned => return Ok(()),
            _ => {
                return Err(ParseError::SignatureMissing {
                    system_id: sender.system_id,
                    component_id: sender.component_id,
                })
            }
        };

        let matches = self.keys.iter().any(|key| {
            key.sign(frame, signature.link_id, signature.timestamp) == signature.signature
        });
        if !matches {
            return Err(ParseError::InvalidSignature {
                system_id: sender.system_id,
                component_id: sender.component_id,
            });
        }

        let mut table = self.table();
        match table.get(&sender) {
            Some(&last) if signature.timestamp <= last => Err(ParseError::ReplayDetected {
                system_id: sender.system_id,
                component_id: sender.component_id,
                timestamp: signature.timestamp,
                last,
            }),
            previous => {
                if previous.is_none() {
                    trace!(%sender, timestamp = signature.timestamp, "first signed frame from sender");
                }
                table.insert(sender, signature.timestamp);
                Ok(())
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Identity, u64>> {
        self.last_accepted.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::frame::{Version, INCOMPAT_SIGNED};

    fn signed_frame(signer: &Signer, timestamp: u64) -> Frame {
        let mut frame = Frame {
            version: Version::V2,
            incompat_flags: INCOMPAT_SIGNED,
            compat_flags: 0,
            sequence: 0,
            system_id: 1,
            component_id: 1,
            message_id: 0,
            payload: Bytes::from_static(&[0, 0, 0, 0, 6, 8, 0, 4, 3]),
            checksum: 0x1234,
            signature: None,
            message: None,
        };
        frame.signature = Some(signer.sign_at(&frame, timestamp));
        frame
    }

    #[test]
    fn passphrase_key_is_sha256() {
        let key = SigningKey::from_passphrase("secret");
        assert_eq!(
            key.as_bytes()[..4],
            [0x2b, 0xb8, 0x0d, 0x53],
            "sha256(\"secret\") prefix"
        );
        assert_eq!(key.as_bytes()[31], 0x5b);
    }

    #[test]
    fn short_key_is_zero_padded() {
        let key = SigningKey::from_bytes(b"abc");
        assert_eq!(&key.as_bytes()[..3], b"abc");
        assert!(key.as_bytes()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = SigningKey::from_bytes(&[0x42; 32]);
        assert_eq!(format!("{key:?}"), "SigningKey(<redacted>)");
    }

    #[test]
    fn timestamps_strictly_increase() {
        let signer = Signer::new(SigningKey::from_bytes(&[1; 32]), 0);
        let mut last = 0;
        for _ in 0..1000 {
            let ts = signer.next_timestamp();
            assert!(ts > last);
            last = ts;
        }
        assert!(last >= timestamp_now().saturating_sub(1000));
    }

    #[test]
    fn increasing_timestamps_verify() {
        let key = SigningKey::from_bytes(&[7; 32]);
        let signer = Signer::new(key.clone(), 2);
        let verifier = Verifier::new(vec![key]);

        verifier.verify(&signed_frame(&signer, 100)).unwrap();
        verifier.verify(&signed_frame(&signer, 101)).unwrap();
        assert_eq!(verifier.last_timestamp(Identity::new(1, 1)), Some(101));
    }

    #[test]
    fn replay_is_rejected() {
        let key = SigningKey::from_bytes(&[7; 32]);
        let signer = Signer::new(key.clone(), 2);
        let verifier = Verifier::new(vec![key]);

        let old = signed_frame(&signer, 100);
        verifier.verify(&old).unwrap();
        verifier.verify(&signed_frame(&signer, 200)).unwrap();

        let err = verifier.verify(&old).unwrap_err();
        assert_eq!(
            err,
            ParseError::ReplayDetected {
                system_id: 1,
                component_id: 1,
                timestamp: 100,
                last: 200,
            }
        );
        let err = verifier.verify(&signed_frame(&signer, 200)).unwrap_err();
        assert!(matches!(err, ParseError::ReplayDetected { .. }));
    }

    #[test]
    fn any_candidate_key_verifies() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let signer = Signer::new(key.clone(), 0);
        let verifier = Verifier::new(vec![SigningKey::from_bytes(&[1; 32]), key]);
        verifier.verify(&signed_frame(&signer, 5)).unwrap();
    }

    #[test]
    fn wrong_key_is_rejected_without_touching_replay_state() {
        let signer = Signer::new(SigningKey::from_bytes(&[9; 32]), 0);
        let verifier = Verifier::new(vec![SigningKey::from_bytes(&[1; 32])]);
        let err = verifier.verify(&signed_frame(&signer, 5)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSignature { .. }));
        assert_eq!(verifier.last_timestamp(Identity::new(1, 1)), None);
    }

    #[test]
    fn unsigned_policy() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let signer = Signer::new(key.clone(), 0);
        let mut frame = signed_frame(&signer, 5);
        frame.signature = None;
        frame.incompat_flags = 0;

        let strict = Verifier::new(vec![key.clone()]);
        assert!(matches!(
            strict.verify(&frame),
            Err(ParseError::SignatureMissing { .. })
        ));

        let lenient = Verifier::new(vec![key]).with_allow_unsigned(true);
        lenient.verify(&frame).unwrap();
    }
}
