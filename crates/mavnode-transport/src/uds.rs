use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Endpoint, Transport};

impl Transport for UnixStream {
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
        "unix-domain-socket"
    }
}

/// Client-mode Unix domain socket endpoint.
///
/// Useful for talking to local routers and simulators that expose a socket
/// path instead of a TCP port.
#[derive(Debug, Clone)]
pub struct UnixClient {
    path: PathBuf,
}

impl UnixClient {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Create an endpoint for the socket at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Connect to the listening socket (blocking).
    pub fn connect(&self) -> Result<UnixStream> {
        let addr = self.path.display().to_string();
        if self.path.as_os_str().len() >= Self::MAX_PATH_LEN {
            return Err(TransportError::Connect {
                addr,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "socket path too long",
                ),
            });
        }

        let stream =
            UnixStream::connect(&self.path).map_err(|source| TransportError::Connect {
                addr,
                source,
            })?;
        debug!(path = ?self.path, "connected to unix domain socket");
        Ok(stream)
    }
}

impl Endpoint for UnixClient {
    fn label(&self) -> String {
        format!("unix:{}", self.path.display())
    }

    fn open(self: Box<Self>) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(self.connect()?))
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixListener;
    use std::thread;

    use super::*;

    #[test]
    fn connect_and_exchange() {
        let dir = std::env::temp_dir().join(format!("mavnode-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("link.sock");
        let _ = std::fs::remove_file(&sock_path);
        let listener = UnixListener::bind(&sock_path).unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            let mut read = 0;
            while read < buf.len() {
                read += Transport::read(&stream, &mut buf[read..]).unwrap();
            }
            assert_eq!(&buf, b"hello");
        });

        let transport = Box::new(UnixClient::new(&sock_path)).open().unwrap();
        assert_eq!(transport.kind(), "unix-domain-socket");
        assert_eq!(Transport::write(transport.as_ref(), b"hello").unwrap(), 5);

        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn close_interrupts_blocked_read() {
        let (left, _right) = UnixStream::pair().unwrap();
        let left: Arc<dyn Transport> = Arc::new(left);

        let reader = {
            let left = Arc::clone(&left);
            thread::spawn(move || {
                let mut buf = [0u8; 8];
                Transport::read(left.as_ref(), &mut buf)
            })
        };

        thread::sleep(std::time::Duration::from_millis(20));
        left.close().unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn path_too_long_rejected() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixClient::new(long_path).connect();
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
