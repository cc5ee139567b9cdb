//! In-process duplex pipe.
//!
//! Two connected [`MemoryTransport`] ends behave like a socket pair: bytes
//! written on one end are read on the other, reads block until data arrives,
//! and closing either end wakes both readers.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::traits::Transport;

#[derive(Default)]
struct PipeState {
    data: VecDeque<u8>,
    closed: bool,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        // A poisoned pipe only means a writer panicked mid-append; the bytes
        // already queued are still well formed.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// One end of an in-memory duplex pipe.
pub struct MemoryTransport {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
}

/// Create a connected pair of in-memory transports.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());
    (
        MemoryTransport {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
        },
        MemoryTransport {
            rx: a_to_b,
            tx: b_to_a,
        },
    )
}

impl MemoryTransport {
    /// Number of bytes buffered for this end to read.
    pub fn pending(&self) -> usize {
        self.rx.lock().data.len()
    }

    /// Take everything currently buffered for this end without blocking.
    pub fn drain(&self) -> Vec<u8> {
        self.rx.lock().data.drain(..).collect()
    }
}

impl Transport for MemoryTransport {
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.rx.lock();
        while state.data.is_empty() && !state.closed {
            state = self
                .rx
                .ready
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }

        let n = buf.len().min(state.data.len());
        for (slot, byte) in buf.iter_mut().zip(state.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.tx.lock();
        if state.closed {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        }
        state.data.extend(buf);
        drop(state);
        self.tx.ready.notify_all();
        Ok(buf.len())
    }

    fn close(&self) -> std::io::Result<()> {
        self.rx.close();
        self.tx.close();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn bytes_cross_the_pair() {
        let (a, b) = memory_pair();
        a.write(b"abc").unwrap();
        b.write(b"xy").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(a.drain(), b"xy");
    }

    #[test]
    fn short_buffer_reads_partially() {
        let (a, b) = memory_pair();
        a.write(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(b.pending(), 2);
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let (a, _b) = memory_pair();
        let a = Arc::new(a);

        let reader = {
            let a = Arc::clone(&a);
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                a.read(&mut buf)
            })
        };

        thread::sleep(Duration::from_millis(20));
        a.close().unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn peer_close_gives_eof_after_drain() {
        let (a, b) = memory_pair();
        a.write(b"last").unwrap();
        a.close().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(b.read(&mut buf).unwrap(), 0);
        assert!(b.write(b"late").is_err());
    }
}
