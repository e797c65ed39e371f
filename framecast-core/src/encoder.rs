//! Still-image frame encoder / decoder.
//!
//! Each broadcast tick every client encodes the shared [`RawFrame`]
//! into an [`EncodedFrame`]: a small fixed header followed by a
//! zstd-compressed copy of the pixel data. The encoded buffer is the
//! payload carried inside one length-prefixed wire frame.
//!
//! ## Payload format
//!
//! ```text
//! width:   u32  (4, big-endian)
//! height:  u32  (4, big-endian)
//! format:  u8   (1, PixelFormat wire tag)
//! pixels:  [u8] (zstd-compressed, tightly packed rows)
//! ```

use std::sync::Arc;

use crate::error::CastError;
use crate::frame::{PixelFormat, RawFrame};

/// Header bytes preceding the compressed pixel data.
pub const IMAGE_HEADER_SIZE: usize = 9;

// ── EncodedFrame ─────────────────────────────────────────────────

/// A compressed frame ready for network transmission.
///
/// Owned exclusively by the client connection that produced it until
/// handed to the socket.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout of the decompressed data.
    pub format: PixelFormat,
    /// Complete wire payload: header + compressed pixels.
    pub data: Vec<u8>,
}

impl EncodedFrame {
    /// Exact payload length on the wire.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Parse an encoded payload's header without decompressing.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, CastError> {
        if data.len() < IMAGE_HEADER_SIZE {
            return Err(CastError::BadFramePayload("shorter than image header"));
        }
        let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
        let format = PixelFormat::from_wire_tag(data[8])
            .ok_or(CastError::BadFramePayload("unknown pixel format tag"))?;
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Zstd-based frame encoder.
///
/// One encoder per client connection: encode speed is each client's
/// own cost, never the capture loop's.
pub struct FrameEncoder {
    /// zstd level (1 = fast; streaming favours speed over ratio).
    compression_level: i32,
    /// Frames encoded so far.
    frame_count: u64,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            compression_level: 1,
            frame_count: 0,
        }
    }

    /// Override the zstd compression level (1..=19).
    pub fn with_level(mut self, level: i32) -> Self {
        self.compression_level = level.clamp(1, 19);
        self
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Encode a shared raw frame into a transmittable payload.
    pub fn encode(&mut self, frame: &Arc<RawFrame>) -> Result<EncodedFrame, CastError> {
        let compressed = zstd::encode_all(frame.data.as_slice(), self.compression_level)?;

        let mut data = Vec::with_capacity(IMAGE_HEADER_SIZE + compressed.len());
        data.extend_from_slice(&frame.width.to_be_bytes());
        data.extend_from_slice(&frame.height.to_be_bytes());
        data.push(frame.format.wire_tag());
        data.extend_from_slice(&compressed);

        self.frame_count += 1;
        Ok(EncodedFrame {
            width: frame.width,
            height: frame.height,
            format: frame.format,
            data,
        })
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── FrameDecoder ─────────────────────────────────────────────────

/// Decompresses encoded payloads back into raw frames.
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one wire payload into a [`RawFrame`].
    pub fn decode(&self, payload: &[u8]) -> Result<RawFrame, CastError> {
        let encoded = EncodedFrame::from_bytes(payload.to_vec())?;
        self.decode_frame(&encoded)
    }

    /// Decode an already-parsed [`EncodedFrame`].
    pub fn decode_frame(&self, encoded: &EncodedFrame) -> Result<RawFrame, CastError> {
        let pixels = zstd::decode_all(&encoded.data[IMAGE_HEADER_SIZE..])
            .map_err(|_| CastError::BadFramePayload("zstd decode failed"))?;

        let expected = RawFrame::expected_len(encoded.width, encoded.height, encoded.format);
        if pixels.len() != expected {
            return Err(CastError::BadFramePayload("pixel data length mismatch"));
        }

        Ok(RawFrame {
            width: encoded.width,
            height: encoded.height,
            format: encoded.format,
            data: pixels,
            timestamp: std::time::Instant::now(),
        })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
