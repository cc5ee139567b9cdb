use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_frame, FrameConfig};
use crate::error::{FrameError, ParseError, Result};
use crate::frame::Frame;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 2 * 1024;

/// Outcome of decoding the next piece of a byte stream.
#[derive(Debug, Clone)]
pub enum Decoded {
    Frame(Frame),
    /// Input was dropped; the stream is still usable.
    Invalid(ParseError),
}

/// Reads frames from any `Read` stream.
///
/// Handles partial reads and resynchronization internally. Parse errors are
/// returned as [`Decoded::Invalid`] and never end the stream; only I/O errors
/// and EOF do.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with the built-in registry and no signature checks.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read until a frame is decoded or input is rejected (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_next(&mut self) -> Result<Decoded> {
        loop {
            match decode_frame(&mut self.buf, &self.config) {
                Ok(Some(frame)) => return Ok(Decoded::Frame(frame)),
                Ok(None) => {}
                Err(err) => return Ok(Decoded::Invalid(err)),
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next valid frame, skipping rejected input (blocking).
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match self.read_next()? {
                Decoded::Frame(frame) => return Ok(frame),
                Decoded::Invalid(err) => debug!(error = %err, "skipping invalid input"),
            }
        }
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mavnode_schema::common::{self, CommandLong, Heartbeat};

    use super::*;
    use crate::codec::encode_message;
    use crate::frame::{Identity, Version};

    fn wire(message: &dyn mavnode_schema::Message, sequence: u8) -> Vec<u8> {
        encode_message(
            message,
            Version::V2,
            sequence,
            Identity::new(1, 1),
            &common::registry(),
            None,
        )
        .unwrap()
        .to_bytes()
        .to_vec()
    }

    #[test]
    fn read_multiple_frames() {
        let mut bytes = wire(&Heartbeat::default(), 0);
        bytes.extend(wire(&CommandLong::new(1, 1, 400), 1));
        bytes.extend(wire(&Heartbeat::default(), 2));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let sequences: Vec<u8> = (0..3).map(|_| reader.read_frame().unwrap().sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&CommandLong::new(2, 3, 400), 9),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        let cmd = frame.message_as::<CommandLong>().unwrap();
        assert_eq!((cmd.target_system, cmd.target_component), (2, 3));
    }

    #[test]
    fn garbage_is_reported_then_skipped() {
        let mut bytes = vec![0x55, 0xAA, 0x00];
        bytes.extend(wire(&Heartbeat::default(), 4));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert!(matches!(
            reader.read_next().unwrap(),
            Decoded::Invalid(ParseError::InvalidMagic { discarded: 3 })
        ));
        assert!(matches!(reader.read_next().unwrap(), Decoded::Frame(f) if f.sequence == 4));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(&Heartbeat::default(), 0);
        bytes.truncate(bytes.len() - 3);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&Heartbeat::default(), 8)),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().sequence, 8);
    }

    #[test]
    fn io_error_propagates() {
        let mut framed = FrameReader::new(FailingReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let frame = encode_message(
            &CommandLong::new(1, 1, 400),
            Version::V2,
            3,
            Identity::new(255, 190),
            &common::registry(),
            None,
        )
        .unwrap();
        writer.write_frame(&frame).unwrap();

        let received = reader.read_frame().unwrap();
        assert_eq!(received.to_bytes(), frame.to_bytes());
        assert_eq!(received.source(), Identity::new(255, 190));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }
}
