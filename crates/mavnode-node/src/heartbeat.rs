use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::config::HeartbeatConfig;
use crate::error::{NodeError, Result};
use crate::node::Shared;

/// Background thread sending the node's HEARTBEAT on every writable channel.
pub(crate) struct HeartbeatTask {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl HeartbeatTask {
    /// Stop the thread and wait for it.
    pub(crate) fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("heartbeat thread panicked");
        }
    }
}

pub(crate) fn spawn(shared: Arc<Shared>, config: HeartbeatConfig) -> Result<HeartbeatTask> {
    let (stop, stopped) = mpsc::channel::<()>();
    let message = config.message();
    let handle = thread::Builder::new()
        .name("mavnode-heartbeat".to_string())
        .spawn(move || loop {
            if let Err(err) = shared.write_message_all(&message) {
                debug!(error = %err, "heartbeat not sent");
            }
            match stopped.recv_timeout(config.period) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .map_err(NodeError::Spawn)?;
    Ok(HeartbeatTask { stop, handle })
}
