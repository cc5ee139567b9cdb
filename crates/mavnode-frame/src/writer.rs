use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{FrameError, Result};
use crate::frame::Frame;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out with a single buffered write loop, so one writer never
/// emits a partial frame followed by another frame's bytes.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Write a frame exactly as stored (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        frame.encode_to(&mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
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
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use mavnode_schema::common::{self, Heartbeat};

    use super::*;
    use crate::codec::{decode_frame, encode_message, FrameConfig};
    use crate::frame::{Identity, Version};

    fn heartbeat_frame(sequence: u8) -> Frame {
        encode_message(
            &Heartbeat::default(),
            Version::V2,
            sequence,
            Identity::new(1, 1),
            &common::registry(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn writes_frames_back_to_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&heartbeat_frame(1)).unwrap();
        writer.write_frame(&heartbeat_frame(2)).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let config = FrameConfig::default();
        let first = decode_frame(&mut wire, &config).unwrap().unwrap();
        let second = decode_frame(&mut wire, &config).unwrap().unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert!(wire.is_empty());
    }

    #[test]
    fn short_writes_are_completed() {
        let frame = heartbeat_frame(5);
        let mut writer = FrameWriter::new(OneBytePerWrite::default());
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.get_ref().data, frame.to_bytes().to_vec());
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_frame(&heartbeat_frame(0)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_and_flush_retry() {
        let flushed = Arc::new(AtomicBool::new(false));
        let mut writer = FrameWriter::new(InterruptOnce {
            wrote: false,
            flushed_once: false,
            flushed: Arc::clone(&flushed),
            data: Vec::new(),
        });
        writer.write_frame(&heartbeat_frame(0)).unwrap();
        assert!(flushed.load(Ordering::SeqCst));
        assert_eq!(writer.get_ref().data.len(), heartbeat_frame(0).wire_size());
    }

    #[derive(Default)]
    struct OneBytePerWrite {
        data: Vec<u8>,
    }

    impl Write for OneBytePerWrite {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    self.data.push(*byte);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        wrote: bool,
        flushed_once: bool,
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote {
                self.wrote = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flushed_once {
                self.flushed_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
