//! Wire codecs for both directions of a session socket.
//!
//! ## Host → viewer: image stream
//!
//! ```text
//! frame := length:u32 (big-endian) || payload[length]
//! ```
//!
//! `length == 0` is a keep-alive and carries no payload; the decoder
//! skips it. Length-prefixing makes the framing content-independent:
//! the payload may contain any byte value, including `0x0A`, which
//! the original newline-delimited scheme could not carry.
//!
//! ## Viewer → host: event stream
//!
//! ```text
//! message := tag:u8 || payload
//! tag 0x01 (KEYBOARD) → payload := key_code:i32 (big-endian) || key_down:u8
//! ```
//!
//! Payload layout is fixed per tag, which is what makes skipping an
//! unrecognised tag and resynchronising possible at all. Future tags
//! must declare a fixed or length-prefixed payload. A malformed
//! payload of a known tag is logged and dropped without surfacing an
//! error; the stream stays aligned and later events still decode.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::CastError;
use crate::event::{KEYBOARD_TAG, KeyboardEvent};

/// Upper bound on a single encoded frame (64 MiB).
///
/// A 4K BGRA frame is ~33 MiB uncompressed; anything past this is a
/// corrupt or hostile length prefix.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Bytes in the length prefix.
const LENGTH_PREFIX_SIZE: usize = 4;

// ── FrameCodec ───────────────────────────────────────────────────

/// Length-prefixed codec for the host→viewer image stream.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a zero-length keep-alive into `dst`.
    pub fn put_keepalive(dst: &mut BytesMut) {
        dst.put_u32(0);
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < LENGTH_PREFIX_SIZE {
                return Ok(None);
            }

            let length = u32::from_be_bytes(src[..LENGTH_PREFIX_SIZE].try_into().unwrap()) as usize;
            if length > MAX_FRAME_SIZE {
                return Err(CastError::FrameTooLarge {
                    size: length,
                    max: MAX_FRAME_SIZE,
                });
            }

            // Keep-alive: consume the prefix and look again.
            if length == 0 {
                src.advance(LENGTH_PREFIX_SIZE);
                continue;
            }

            if src.len() < LENGTH_PREFIX_SIZE + length {
                // Reserve for the rest of the frame before more reads.
                src.reserve(LENGTH_PREFIX_SIZE + length - src.len());
                return Ok(None);
            }

            src.advance(LENGTH_PREFIX_SIZE);
            return Ok(Some(src.split_to(length).freeze()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            // A partial frame followed by stream end is a framing
            // error, not silent success.
            None => Err(CastError::TruncatedFrame { pending: src.len() }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CastError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_SIZE {
            return Err(CastError::FrameTooLarge {
                size: item.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── EventCodec ───────────────────────────────────────────────────

/// Tag-prefixed codec for the viewer→host event stream.
#[derive(Debug, Default)]
pub struct EventCodec;

impl EventCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for EventCodec {
    type Item = KeyboardEvent;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }

            match src[0] {
                KEYBOARD_TAG => {
                    if src.len() < 1 + KeyboardEvent::PAYLOAD_SIZE {
                        return Ok(None);
                    }
                    src.advance(1);
                    let payload = src.split_to(KeyboardEvent::PAYLOAD_SIZE);
                    match KeyboardEvent::from_payload(&payload) {
                        Ok(event) => return Ok(Some(event)),
                        // The fixed-size payload is already consumed,
                        // so the stream stays aligned. A decode error
                        // would fuse the framed stream; skipping here
                        // keeps the connection alive.
                        Err(e) => warn!(error = %e, "skipping malformed keyboard event"),
                    }
                }
                unknown => {
                    // Unknown tag: the payload length is unknowable,
                    // so skip one byte until a known tag lines up.
                    warn!(tag = unknown, "skipping unrecognised event tag");
                    src.advance(1);
                }
            }
        }
    }
}

impl Encoder<KeyboardEvent> for EventCodec {
    type Error = CastError;

    fn encode(&mut self, item: KeyboardEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(1 + KeyboardEvent::PAYLOAD_SIZE);
        dst.put_u8(KEYBOARD_TAG);
        dst.extend_from_slice(&item.to_payload());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
