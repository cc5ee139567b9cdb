use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Endpoint, Transport};

impl Transport for TcpStream {
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut stream = self;
        Read::read(&mut stream, buf)
    }

    fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
        let mut stream = self;
        Write::write(&mut stream, buf)
    }

    fn flush(&self) -> std::io::Result<()> {
        let mut stream = self;
        Write::flush(&mut stream)
    }

    fn close(&self) -> std::io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}

/// Client-mode TCP endpoint: dials `addr` when the channel opens.
#[derive(Debug, Clone)]
pub struct TcpClient {
    addr: String,
    connect_timeout: Duration,
}

impl TcpClient {
    /// Default dial timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create an endpoint for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the dial timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Dial synchronously.
    pub fn connect(&self) -> Result<TcpStream> {
        let connect_err = |source| TransportError::Connect {
            addr: self.addr.clone(),
            source,
        };

        let mut last_err = None;
        for addr in self.addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(connect_err)?;
                    debug!(addr = %self.addr, "connected to tcp endpoint");
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        })))
    }
}

impl Endpoint for TcpClient {
    fn label(&self) -> String {
        format!("tcp:{}", self.addr)
    }

    fn open(self: Box<Self>) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(self.connect()?))
    }
}
