//! Envelope framing — length-prefixed binary frames over TCP.
//!
//! Each frame is a 4-byte big-endian payload length followed by the
//! bincode-encoded [`Envelope`]. Frames above [`MAX_FRAME_SIZE`] are
//! rejected before the payload is buffered.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::constants::MAX_FRAME_SIZE;
use crate::protocol::Envelope;

/// Codec error: oversized frame, serialization failure, or I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds maximum ({MAX_FRAME_SIZE} bytes)")]
    FrameTooLarge(usize),
    #[error("envelope serialization failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A tokio codec that frames [`Envelope`]s with a `u32` length prefix.
#[derive(Debug, Default)]
pub struct EnvelopeCodec;

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge(len));
        }

        if src.len() < 4 + len {
            // Not a complete frame yet; reserve what the rest will need.
            src.reserve(4 + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let body = src.split_to(len);
        Ok(Some(Envelope::from_bytes(&body)?))
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.to_bytes()?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge(body.len()));
        }

        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}
