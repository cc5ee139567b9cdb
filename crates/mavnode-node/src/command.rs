//! Command protocol: COMMAND_LONG / COMMAND_INT requests resolved by COMMAND_ACK.
//!
//! Channel read loops hand every incoming COMMAND_ACK to the [`CommandTable`],
//! which forwards it to the matching waiter. The waiting itself, including
//! progress callbacks, timeouts and retransmission, happens on the thread that
//! called [`Node::send_command`].

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mavnode_frame::{Frame, Identity};
use mavnode_schema::common::{CommandAck, CommandInt, CommandLong, MavResult};
use mavnode_schema::MessageData;
use tracing::{debug, warn};

use crate::error::{NodeError, Result};
use crate::event::ChannelId;
use crate::node::{lock, Node};

/// A message that starts a command transaction.
pub trait Command: MessageData {
    /// System and component the command is addressed to. Zero ids are wildcards.
    fn target(&self) -> Identity;

    fn command_id(&self) -> u16;

    /// Mark the next transmission as a retry.
    fn bump_confirmation(&mut self) {}
}

impl Command for CommandLong {
    fn target(&self) -> Identity {
        Identity::new(self.target_system, self.target_component)
    }

    fn command_id(&self) -> u16 {
        self.command
    }

    fn bump_confirmation(&mut self) {
        self.confirmation = self.confirmation.wrapping_add(1);
    }
}

impl Command for CommandInt {
    fn target(&self) -> Identity {
        Identity::new(self.target_system, self.target_component)
    }

    fn command_id(&self) -> u16 {
        self.command
    }
}

/// How [`Node::send_command`] waits for the result.
pub struct CommandOptions {
    /// Wait for an acknowledgement. Restarted by every `IN_PROGRESS` ack.
    pub timeout: Duration,
    /// Re-sends when the window passes without any acknowledgement.
    pub retries: u32,
    /// Send on this channel only instead of all writable channels.
    pub channel: Option<ChannelId>,
    /// Called with the progress value of each `IN_PROGRESS` ack.
    pub on_progress: Option<Box<dyn FnMut(u8) + Send>>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retries: 0,
            channel: None,
            on_progress: None,
        }
    }
}

impl CommandOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(u8) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("channel", &self.channel)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Final acknowledgement of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub command: u16,
    pub result: MavResult,
    pub result_param2: i32,
    /// Progress value carried by the final ack.
    pub progress: u8,
    /// Time from the first transmission to the final ack.
    pub response_time: Duration,
    /// Sender of the final ack.
    pub responder: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CommandKey {
    target: Identity,
    command: u16,
}

impl CommandKey {
    fn new(target: Identity, command: u16) -> Self {
        Self { target, command }
    }

    fn matches(&self, responder: Identity, command: u16) -> bool {
        self.command == command
            && (self.target.system_id == 0 || self.target.system_id == responder.system_id)
            && (self.target.component_id == 0
                || self.target.component_id == responder.component_id)
    }
}

#[derive(Debug)]
pub(crate) enum AckUpdate {
    Ack { ack: CommandAck, responder: Identity },
    Closed,
}

/// Commands waiting for acknowledgements, shared by all channels of a node.
#[derive(Debug, Default)]
pub(crate) struct CommandTable {
    pending: Mutex<HashMap<CommandKey, Sender<AckUpdate>>>,
}

impl CommandTable {
    fn register(&self, key: CommandKey) -> Result<Receiver<AckUpdate>> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(&key) {
            return Err(NodeError::CommandPending {
                command: key.command,
                target_system: key.target.system_id,
                target_component: key.target.component_id,
            });
        }
        let (tx, rx) = mpsc::channel();
        pending.insert(key, tx);
        Ok(rx)
    }

    fn remove(&self, key: &CommandKey) {
        lock(&self.pending).remove(key);
    }

    /// Route a received frame to the waiter it acknowledges, if any.
    pub(crate) fn observe(&self, frame: &Frame, local: Identity) {
        if frame.message_id != CommandAck::ID {
            return;
        }
        let pending = lock(&self.pending);
        if pending.is_empty() {
            return;
        }
        let ack = match frame.message_as::<CommandAck>() {
            Some(ack) => ack.clone(),
            None => CommandAck::decode(&frame.payload),
        };
        if (ack.target_system != 0 && ack.target_system != local.system_id)
            || (ack.target_component != 0 && ack.target_component != local.component_id)
        {
            return;
        }

        let responder = frame.source();
        for (key, tx) in pending.iter() {
            if key.matches(responder, ack.command) {
                let _ = tx.send(AckUpdate::Ack {
                    ack: ack.clone(),
                    responder,
                });
            }
        }
    }

    /// Wake every waiter with a node-closed failure.
    pub(crate) fn fail_all(&self) {
        for (_, tx) in lock(&self.pending).drain() {
            let _ = tx.send(AckUpdate::Closed);
        }
    }
}

/// Unregisters a command when its waiter returns.
struct PendingGuard<'a> {
    table: &'a CommandTable,
    key: CommandKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.key);
    }
}

impl Node {
    /// Send a command and block until its final acknowledgement.
    ///
    /// The ack may arrive on any channel. `IN_PROGRESS` acks call
    /// `options.on_progress` on this thread and restart the timeout window.
    /// Results other than `ACCEPTED` are returned as
    /// [`NodeError::CommandRejected`].
    pub fn send_command<C: Command>(&self, mut command: C, mut options: CommandOptions) -> Result<CommandResponse> {
        let commands = &self.shared().commands;
        let key = CommandKey::new(command.target(), command.command_id());
        let updates = commands.register(key)?;
        let _guard = PendingGuard { table: commands, key };

        let started = Instant::now();
        self.transmit(&command, options.channel)?;
        debug!(command = key.command, target = %key.target, "command sent");

        let mut deadline = Instant::now() + options.timeout;
        let mut retries_left = options.retries;
        let mut acknowledged = false;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match updates.recv_timeout(wait) {
                Ok(AckUpdate::Ack { ack, responder }) => {
                    acknowledged = true;
                    if ack.result == MavResult::IN_PROGRESS {
                        debug!(command = key.command, progress = ack.progress, "command in progress");
                        if let Some(callback) = options.on_progress.as_mut() {
                            callback(ack.progress);
                        }
                        deadline = Instant::now() + options.timeout;
                        continue;
                    }

                    let response = CommandResponse {
                        command: ack.command,
                        result: ack.result,
                        result_param2: ack.result_param2,
                        progress: ack.progress,
                        response_time: started.elapsed(),
                        responder,
                    };
                    debug!(command = key.command, result = %ack.result, %responder, "command finished");
                    if ack.result == MavResult::ACCEPTED {
                        return Ok(response);
                    }
                    return Err(NodeError::CommandRejected { response });
                }
                Ok(AckUpdate::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(NodeError::NodeClosed);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !acknowledged && retries_left > 0 {
                        retries_left -= 1;
                        command.bump_confirmation();
                        debug!(command = key.command, retries_left, "retrying command");
                        self.transmit(&command, options.channel)?;
                        deadline = Instant::now() + options.timeout;
                        continue;
                    }
                    warn!(command = key.command, target = %key.target, timeout = ?options.timeout, "command timed out");
                    return Err(NodeError::CommandTimeout {
                        command: key.command,
                        target_system: key.target.system_id,
                        target_component: key.target.component_id,
                        timeout: options.timeout,
                    });
                }
            }
        }
    }

    fn transmit<C: Command>(&self, command: &C, channel: Option<ChannelId>) -> Result<()> {
        match channel {
            Some(channel) => self.write_message_to(channel, command),
            None => self.write_message_all(command),
        }
    }
}
