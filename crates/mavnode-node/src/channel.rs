use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use mavnode_frame::{Decoded, Frame, FrameError, FrameReader, FrameWriter};
use mavnode_transport::{Transport, TransportIo};
use tracing::{debug, trace};

use crate::event::{ChannelId, ChannelInfo, CloseReason, Direction, Event};
use crate::node::{lock, Shared};

/// One transport owned by a node.
///
/// Writes are serialized by the writer mutex. The close reason is set exactly
/// once; whoever sets it also closes the transport, which ends a blocked read.
pub(crate) struct Channel {
    pub(crate) id: ChannelId,
    pub(crate) label: String,
    pub(crate) direction: Direction,
    transport: Arc<dyn Transport>,
    writer: Mutex<FrameWriter<TransportIo>>,
    close_reason: Mutex<Option<CloseReason>>,
}

impl Channel {
    pub(crate) fn new(
        id: ChannelId,
        label: String,
        direction: Direction,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let writer = FrameWriter::new(TransportIo::new(Arc::clone(&transport)));
        Self {
            id,
            label,
            direction,
            transport,
            writer: Mutex::new(writer),
            close_reason: Mutex::new(None),
        }
    }

    pub(crate) fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id,
            label: self.label.clone(),
            direction: self.direction,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        lock(&self.close_reason).is_none()
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        lock(&self.close_reason).clone()
    }

    /// Write one frame as a unit.
    pub(crate) fn write(&self, frame: &Frame) -> Result<(), FrameError> {
        let mut writer = lock(&self.writer);
        if !self.is_open() {
            return Err(FrameError::ConnectionClosed);
        }
        writer.write_frame(frame)
    }

    /// Record why the channel closes and close the transport.
    ///
    /// Returns `true` for the call that actually closed the channel.
    pub(crate) fn shutdown(&self, reason: CloseReason) -> bool {
        {
            let mut slot = lock(&self.close_reason);
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        if let Err(err) = self.transport.close() {
            debug!(channel = %self.id, label = %self.label, error = %err, "transport close failed");
        }
        true
    }
}

/// Read loop of one channel. Runs until the transport reports EOF or an error.
pub(crate) fn run_reader(shared: &Shared, channel: &Channel, events: &Sender<Event>) {
    let io = TransportIo::new(Arc::clone(&channel.transport));
    let mut reader = FrameReader::with_config(io, shared.frame_config.clone());

    let reason = loop {
        match reader.read_next() {
            Ok(Decoded::Frame(frame)) => {
                if !channel.is_open() {
                    continue;
                }
                trace!(
                    channel = %channel.id,
                    message_id = frame.message_id,
                    sequence = frame.sequence,
                    source = %frame.source(),
                    "frame received"
                );
                shared.commands.observe(&frame, shared.identity);
                let event = Event::FrameReceived {
                    channel: channel.id,
                    frame,
                };
                if events.send(event).is_err() {
                    break CloseReason::Shutdown;
                }
            }
            Ok(Decoded::Invalid(error)) => {
                debug!(channel = %channel.id, label = %channel.label, %error, "parse error");
                let event = Event::ParseError {
                    channel: channel.id,
                    error,
                };
                if events.send(event).is_err() {
                    break CloseReason::Shutdown;
                }
            }
            Err(FrameError::ConnectionClosed) => break CloseReason::Eof,
            Err(err) => break CloseReason::Error(err.to_string()),
        }
    };

    channel.shutdown(reason);
    shared.finish_channel(channel, events);
}
