use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use mavnode_frame::{decode_frame, encode_message, Frame, FrameConfig, FrameReader, Identity, Version};
use mavnode_schema::common::{self, Heartbeat};
use mavnode_schema::Message;
use mavnode_transport::{memory_pair, MemoryTransport, Transport, TransportIo};

use crate::{ChannelId, Direction, Event, Node, NodeConfig};

pub(crate) const VEHICLE: Identity = Identity::new(1, 1);

pub(crate) fn node() -> Node {
    Node::new(NodeConfig::new(Identity::new(255, 190))).unwrap()
}

/// Attach one end of a memory pipe; the other end plays the remote system.
pub(crate) fn attach(node: &Node, label: &str, direction: Direction) -> (ChannelId, Arc<MemoryTransport>) {
    let (local, remote) = memory_pair();
    let id = node.add_transport(label, Arc::new(local), direction).unwrap();
    (id, Arc::new(remote))
}

pub(crate) fn heartbeat() -> Heartbeat {
    Heartbeat {
        mav_type: 2,
        autopilot: 3,
        system_status: 4,
        mavlink_version: 3,
        ..Heartbeat::default()
    }
}

/// Wire bytes of `message` sent by the remote vehicle.
pub(crate) fn vehicle_bytes(message: &dyn Message, sequence: u8) -> Vec<u8> {
    let registry = common::registry();
    encode_message(message, Version::V2, sequence, VEHICLE, &registry, None)
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub(crate) fn decode_all(bytes: &[u8]) -> Vec<Frame> {
    let config = FrameConfig::default();
    let mut buf = BytesMut::from(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = decode_frame(&mut buf, &config).unwrap() {
        frames.push(frame);
    }
    frames
}

/// Blocking frame reader over the remote end of a pipe.
pub(crate) fn remote_reader(remote: &Arc<MemoryTransport>) -> FrameReader<TransportIo> {
    let transport: Arc<dyn Transport> = remote.clone();
    FrameReader::new(TransportIo::new(transport))
}

/// Skip events until one matches, failing after two seconds of silence.
pub(crate) fn wait_for(node: &Node, mut pred: impl FnMut(&Event) -> bool) -> Event {
    loop {
        let event = node
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
            .expect("timed out waiting for event");
        if pred(&event) {
            return event;
        }
    }
}
