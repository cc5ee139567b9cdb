//! `tokio_util::codec` adapter for use with `Framed` streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, FrameConfig};
use crate::error::FrameError;
use crate::frame::Frame;
use crate::reader::Decoded;

/// Frame codec for `tokio_util::codec::Framed`.
///
/// Yields [`Decoded`] items so parse errors reach the consumer without ending
/// the stream.
#[derive(Debug, Clone, Default)]
pub struct MavCodec {
    config: FrameConfig,
}

impl MavCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for MavCodec {
    type Item = Decoded;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match decode_frame(src, &self.config) {
            Ok(Some(frame)) => Ok(Some(Decoded::Frame(frame))),
            Ok(None) => Ok(None),
            Err(err) => Ok(Some(Decoded::Invalid(err))),
        }
    }
}

impl Encoder<&Frame> for MavCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_to(dst);
        Ok(())
    }
}

impl Encoder<Frame> for MavCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_to(dst);
        Ok(())
    }
}
