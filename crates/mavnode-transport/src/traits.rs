use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::Result;

/// A connected duplex byte stream.
///
/// All methods take `&self` so one handle can be shared between a blocking
/// reader thread and any number of writers. Implementations must make
/// [`Transport::close`] interrupt a read that is blocked in another thread;
/// setting a flag is not enough.
pub trait Transport: Send + Sync + 'static {
    /// Read available bytes into `buf`. `Ok(0)` means end of stream.
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write some bytes from `buf`, returning how many were accepted.
    fn write(&self, buf: &[u8]) -> std::io::Result<usize>;

    /// Flush buffered output, if any.
    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }

    /// Close both directions and wake any blocked reader.
    fn close(&self) -> std::io::Result<()>;

    /// Transport name for diagnostics.
    fn kind(&self) -> &'static str;
}

/// Factory that opens a transport.
///
/// Opening runs on the channel's own thread, so a slow dial never blocks the
/// node. Implementations should bound how long `open` may take.
pub trait Endpoint: Send + 'static {
    /// Human-readable label used for the resulting channel.
    fn label(&self) -> String;

    /// Establish the connection.
    fn open(self: Box<Self>) -> Result<Arc<dyn Transport>>;
}

/// `Read`/`Write` adaptor over a shared transport handle.
#[derive(Clone)]
pub struct TransportIo {
    inner: Arc<dyn Transport>,
}

impl TransportIo {
    /// Wrap a shared transport.
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }

    /// Borrow the shared transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner
    }
}

impl Read for TransportIo {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TransportIo {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for TransportIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportIo")
            .field("type", &self.inner.kind())
            .finish()
    }
}
