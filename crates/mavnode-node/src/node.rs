use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mavnode_frame::{
    encode_message, fix_frame, Frame, FrameConfig, FrameError, Identity, Signer, Verifier,
    Version,
};
use mavnode_schema::{DialectRegistry, Message};
use mavnode_transport::{Endpoint, Transport};
use tracing::{debug, info, trace, warn};

use crate::channel::{run_reader, Channel};
use crate::command::CommandTable;
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::event::{ChannelId, ChannelInfo, CloseReason, Direction, Event};
use crate::heartbeat::{self, HeartbeatTask};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Destination set of a write.
#[derive(Debug, Clone, Copy)]
enum Route {
    All,
    To(ChannelId),
    Except(ChannelId),
}

struct State {
    closed: bool,
    channels: BTreeMap<ChannelId, Arc<Channel>>,
    events: Option<Sender<Event>>,
    workers: Vec<JoinHandle<()>>,
}

/// State shared between the node handle and its channel threads.
pub(crate) struct Shared {
    pub(crate) identity: Identity,
    pub(crate) out_version: Version,
    pub(crate) registry: Arc<DialectRegistry>,
    pub(crate) frame_config: FrameConfig,
    pub(crate) signer: Option<Signer>,
    pub(crate) commands: CommandTable,
    sequence: AtomicU8,
    next_channel: AtomicU64,
    state: Mutex<State>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    fn next_channel_id(&self) -> ChannelId {
        ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a channel to the routing table, announce it and start its read loop.
    ///
    /// The reader handle is stored under the same lock that admits the channel,
    /// so a concurrent `close` either rejects the channel or joins its reader.
    fn attach(self: &Arc<Self>, channel: &Arc<Channel>) -> Result<()> {
        let mut state = self.state();
        if state.closed {
            return Err(NodeError::NodeClosed);
        }
        let events = state.events.clone().ok_or(NodeError::NodeClosed)?;

        state.channels.insert(channel.id, Arc::clone(channel));
        info!(
            channel = %channel.id,
            label = %channel.label,
            direction = ?channel.direction,
            "channel open"
        );
        let _ = events.send(Event::ChannelOpen {
            channel: channel.id,
            label: channel.label.clone(),
        });

        if channel.direction.readable() {
            let shared = Arc::clone(self);
            let reader = Arc::clone(channel);
            let reader_events = events.clone();
            let spawned = thread::Builder::new()
                .name(format!("mavnode-channel-{}", channel.id.get()))
                .spawn(move || run_reader(&shared, &reader, &reader_events));
            match spawned {
                Ok(handle) => state.workers.push(handle),
                Err(err) => {
                    state.channels.remove(&channel.id);
                    channel.shutdown(CloseReason::Error(err.to_string()));
                    let _ = events.send(Event::ChannelClose {
                        channel: channel.id,
                        label: channel.label.clone(),
                        reason: CloseReason::Error(err.to_string()),
                    });
                    return Err(NodeError::Spawn(err));
                }
            }
        }
        Ok(())
    }

    /// Remove a closed channel and emit its `ChannelClose`.
    pub(crate) fn finish_channel(&self, channel: &Channel, events: &Sender<Event>) {
        self.state().channels.remove(&channel.id);
        let reason = channel.close_reason().unwrap_or(CloseReason::Eof);
        info!(channel = %channel.id, label = %channel.label, %reason, "channel closed");
        let _ = events.send(Event::ChannelClose {
            channel: channel.id,
            label: channel.label.clone(),
            reason,
        });
    }

    /// Close a channel from outside its read loop.
    fn close_channel(&self, channel: &Channel, reason: CloseReason) {
        if !channel.shutdown(reason) || channel.direction.readable() {
            // The read loop reports the close once the transport is drained.
            return;
        }
        let events = self.state().events.clone();
        match events {
            Some(events) => self.finish_channel(channel, &events),
            None => {
                self.state().channels.remove(&channel.id);
            }
        }
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn encode(&self, message: &dyn Message) -> Result<Frame> {
        let frame = encode_message(
            message,
            self.out_version,
            self.next_sequence(),
            self.identity,
            &self.registry,
            self.signer.as_ref(),
        )?;
        Ok(frame)
    }

    fn targets(&self, route: Route) -> Result<Vec<Arc<Channel>>> {
        let state = self.state();
        if state.closed {
            return Err(NodeError::NodeClosed);
        }
        match route {
            Route::To(id) => {
                let channel = state
                    .channels
                    .get(&id)
                    .filter(|channel| channel.is_open())
                    .ok_or(NodeError::ChannelClosed(id))?;
                if !channel.direction.writable() {
                    return Err(NodeError::ChannelNotWritable(id));
                }
                Ok(vec![Arc::clone(channel)])
            }
            Route::All | Route::Except(_) => Ok(state
                .channels
                .values()
                .filter(|channel| channel.direction.writable())
                .filter(|channel| !matches!(route, Route::Except(id) if id == channel.id))
                .cloned()
                .collect()),
        }
    }

    fn write_channel(&self, channel: &Channel, frame: &Frame) -> std::result::Result<(), FrameError> {
        match channel.write(frame) {
            Ok(()) => {
                trace!(
                    channel = %channel.id,
                    message_id = frame.message_id,
                    sequence = frame.sequence,
                    "frame written"
                );
                Ok(())
            }
            Err(err) => {
                warn!(channel = %channel.id, label = %channel.label, error = %err, "write failed, closing channel");
                self.close_channel(channel, CloseReason::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn route_frame(&self, frame: &Frame, route: Route) -> Result<()> {
        let targets = self.targets(route)?;
        match route {
            Route::To(_) => {
                for channel in &targets {
                    self.write_channel(channel, frame)?;
                }
            }
            Route::All | Route::Except(_) => {
                // A failing channel is closed; the others still get the frame.
                for channel in &targets {
                    let _ = self.write_channel(channel, frame);
                }
            }
        }
        Ok(())
    }

    fn route_message(&self, message: &dyn Message, route: Route) -> Result<()> {
        self.targets(route)?;
        let frame = self.encode(message)?;
        self.route_frame(&frame, route)
    }

    pub(crate) fn write_message_all(&self, message: &dyn Message) -> Result<()> {
        self.route_message(message, Route::All)
    }

    pub(crate) fn write_message_to(&self, channel: ChannelId, message: &dyn Message) -> Result<()> {
        self.route_message(message, Route::To(channel))
    }
}

/// A MAVLink participant with one identity and any number of channels.
///
/// Every channel gets its own reader thread. Decoded frames, parse errors and
/// channel lifecycle changes from all channels are merged into one stream,
/// consumed with [`Node::recv`] or [`Node::events`]. Writes go out through the
/// routing methods and carry a single node-wide sequence counter.
///
/// Dropping the node closes it.
pub struct Node {
    shared: Arc<Shared>,
    events: Mutex<Receiver<Event>>,
    heartbeat: Mutex<Option<HeartbeatTask>>,
}

impl Node {
    /// Create a node. Channels are added afterwards.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate().map_err(NodeError::InvalidConfig)?;

        let mut frame_config = FrameConfig::new(Arc::clone(&config.registry))
            .with_reject_unknown_messages(config.reject_unknown_messages);
        if !config.signing.in_keys.is_empty() {
            let verifier = Verifier::new(config.signing.in_keys.clone())
                .with_allow_unsigned(config.signing.allow_unsigned);
            frame_config = frame_config.with_verifier(Arc::new(verifier));
        }
        let signer = config
            .signing
            .out_key
            .clone()
            .map(|key| Signer::new(key, config.signing.link_id));

        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            identity: config.identity,
            out_version: config.out_version,
            registry: Arc::clone(&config.registry),
            frame_config,
            signer,
            commands: CommandTable::default(),
            sequence: AtomicU8::new(0),
            next_channel: AtomicU64::new(1),
            state: Mutex::new(State {
                closed: false,
                channels: BTreeMap::new(),
                events: Some(tx),
                workers: Vec::new(),
            }),
        });

        let node = Self {
            shared,
            events: Mutex::new(rx),
            heartbeat: Mutex::new(None),
        };
        if let Some(hb) = config.heartbeat {
            let task = heartbeat::spawn(Arc::clone(&node.shared), hb)?;
            *lock(&node.heartbeat) = Some(task);
        }

        info!(
            identity = %config.identity,
            version = %config.out_version,
            signing = node.shared.signer.is_some(),
            "node started"
        );
        Ok(node)
    }

    pub fn identity(&self) -> Identity {
        self.shared.identity
    }

    pub fn registry(&self) -> &Arc<DialectRegistry> {
        &self.shared.registry
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Add a connected transport as a new channel.
    pub fn add_transport(
        &self,
        label: impl Into<String>,
        transport: Arc<dyn Transport>,
        direction: Direction,
    ) -> Result<ChannelId> {
        let id = self.shared.next_channel_id();
        let channel = Arc::new(Channel::new(id, label.into(), direction, transport));
        self.shared.attach(&channel)?;
        Ok(id)
    }

    /// Open an endpoint on its own thread and add it as a channel.
    ///
    /// The id is returned immediately. `ChannelOpen` follows once the endpoint
    /// connects; if it cannot, a `ChannelClose` with
    /// [`CloseReason::OpenFailed`] is emitted instead.
    ///
    /// The opening thread is not joined by [`Node::close`]. If the node closes
    /// while the endpoint is still connecting, the transport is shut down as
    /// soon as `open` returns and no event is emitted.
    pub fn add_endpoint(&self, endpoint: Box<dyn Endpoint>, direction: Direction) -> Result<ChannelId> {
        if self.is_closed() {
            return Err(NodeError::NodeClosed);
        }
        let id = self.shared.next_channel_id();
        let label = endpoint.label();

        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("mavnode-open-{}", id.get()))
            .spawn(move || {
                debug!(channel = %id, %label, "opening endpoint");
                let transport = match endpoint.open() {
                    Ok(transport) => transport,
                    Err(err) => {
                        warn!(channel = %id, %label, error = %err, "endpoint open failed");
                        if let Some(events) = shared.state().events.clone() {
                            let _ = events.send(Event::ChannelClose {
                                channel: id,
                                label,
                                reason: CloseReason::OpenFailed(err.to_string()),
                            });
                        }
                        return;
                    }
                };

                let channel = Arc::new(Channel::new(id, label, direction, transport));
                if let Err(err) = shared.attach(&channel) {
                    debug!(channel = %id, error = %err, "dropping endpoint opened after close");
                    channel.shutdown(CloseReason::Shutdown);
                }
            })
            .map_err(NodeError::Spawn)?;
        Ok(id)
    }

    /// Open channels, ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.shared
            .state()
            .channels
            .values()
            .filter(|channel| channel.is_open())
            .map(|channel| channel.info())
            .collect()
    }

    /// Close one channel. Its `ChannelClose` event follows on the stream.
    pub fn close_channel(&self, id: ChannelId) -> Result<()> {
        let channel = self
            .shared
            .state()
            .channels
            .get(&id)
            .cloned()
            .ok_or(NodeError::ChannelClosed(id))?;
        self.shared.close_channel(&channel, CloseReason::Shutdown);
        Ok(())
    }

    /// Encode a message and send it on every writable channel.
    pub fn write_message_all(&self, message: &dyn Message) -> Result<()> {
        self.shared.write_message_all(message)
    }

    /// Encode a message and send it on one channel.
    pub fn write_message_to(&self, channel: ChannelId, message: &dyn Message) -> Result<()> {
        self.shared.write_message_to(channel, message)
    }

    /// Encode a message and send it on every writable channel but one.
    pub fn write_message_except(&self, channel: ChannelId, message: &dyn Message) -> Result<()> {
        self.shared.route_message(message, Route::Except(channel))
    }

    /// Send a frame verbatim on every writable channel.
    pub fn write_frame_all(&self, frame: &Frame) -> Result<()> {
        self.shared.route_frame(frame, Route::All)
    }

    /// Send a frame verbatim on one channel.
    pub fn write_frame_to(&self, channel: ChannelId, frame: &Frame) -> Result<()> {
        self.shared.route_frame(frame, Route::To(channel))
    }

    /// Relay a frame verbatim to every writable channel except the one it came from.
    ///
    /// Sequence number, checksum and signature are left untouched.
    pub fn write_frame_except(&self, channel: ChannelId, frame: &Frame) -> Result<()> {
        self.shared.route_frame(frame, Route::Except(channel))
    }

    /// Recompute payload, checksum and (with an out key) signature after the
    /// frame's message was modified in place.
    pub fn fix_frame(&self, frame: &mut Frame) -> Result<()> {
        fix_frame(frame, &self.shared.registry, self.shared.signer.as_ref())?;
        Ok(())
    }

    fn receiver(&self) -> MutexGuard<'_, Receiver<Event>> {
        lock(&self.events)
    }

    /// Next event, blocking. `None` once the node is closed and drained.
    pub fn recv(&self) -> Option<Event> {
        self.receiver().recv().ok()
    }

    /// Next event, waiting at most `timeout`. `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Event>> {
        match self.receiver().recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(NodeError::NodeClosed),
        }
    }

    /// Next event if one is ready.
    pub fn try_recv(&self) -> Result<Option<Event>> {
        match self.receiver().try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(NodeError::NodeClosed),
        }
    }

    /// Blocking iterator over the event stream. Ends when the node is closed.
    pub fn events(&self) -> Events<'_> {
        Events { node: self }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }

    /// Shut down every channel, fail pending commands and end the event stream.
    ///
    /// Blocks until every channel read loop has exited; endpoints still
    /// connecting are not waited for. Calling it again is a no-op.
    pub fn close(&self) {
        let (channels, workers, events) = {
            let mut state = self.shared.state();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                std::mem::take(&mut state.channels),
                std::mem::take(&mut state.workers),
                state.events.take(),
            )
        };

        self.shared.commands.fail_all();

        for channel in channels.values() {
            if channel.shutdown(CloseReason::Shutdown) && !channel.direction.readable() {
                if let Some(events) = &events {
                    self.shared.finish_channel(channel, events);
                }
            }
        }
        drop(events);

        if let Some(task) = lock(&self.heartbeat).take() {
            task.stop();
        }

        for worker in workers {
            if worker.join().is_err() {
                warn!("channel thread panicked");
            }
        }
        info!(identity = %self.shared.identity, "node closed");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identity", &self.shared.identity)
            .field("out_version", &self.shared.out_version)
            .field("channels", &self.channels().len())
            .finish()
    }
}

/// Iterator returned by [`Node::events`].
pub struct Events<'a> {
    node: &'a Node,
}

impl Iterator for Events<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.node.recv()
    }
}
