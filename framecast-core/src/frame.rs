//! Shared frame types for the capture/broadcast pipeline.
//!
//! A [`RawFrame`] is immutable once built: the capture loop wraps it
//! in an `Arc` and every client's sender task encodes from the same
//! allocation. Nothing mutates a frame after capture, so no locking
//! is needed on the frame itself.

use std::time::Instant;

// ── WindowHandle ─────────────────────────────────────────────────

/// Opaque OS window identifier for the captured application.
///
/// The core never interprets the value; it is handed to the external
/// capture and injection collaborators as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Wire discriminant used in the encoded-frame header.
    pub const fn wire_tag(self) -> u8 {
        match self {
            PixelFormat::Bgra8 => 0,
            PixelFormat::Rgba8 => 1,
            PixelFormat::Rgb8 => 2,
        }
    }

    /// Inverse of [`wire_tag`](Self::wire_tag).
    pub const fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::Bgra8),
            1 => Some(PixelFormat::Rgba8),
            2 => Some(PixelFormat::Rgb8),
            _ => None,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw, uncompressed bitmap produced by the frame source.
///
/// Rows are tightly packed: `data` holds exactly
/// `width * height * bytes_per_pixel` bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Pixel data, tightly packed.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Byte size one frame of these dimensions must occupy.
    pub fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }

    /// Total byte size of the bitmap.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns one row of pixels.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of bounds.
    pub fn row(&self, y: u32) -> &[u8] {
        let row_len = self.width as usize * self.format.bytes_per_pixel();
        let start = y as usize * row_len;
        &self.data[start..start + row_len]
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Bgra8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
    }

    #[test]
    fn wire_tag_roundtrip() {
        for fmt in [PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::Rgb8] {
            assert_eq!(PixelFormat::from_wire_tag(fmt.wire_tag()), Some(fmt));
        }
        assert_eq!(PixelFormat::from_wire_tag(0xFF), None);
    }

    #[test]
    fn row_access() {
        let frame = RawFrame {
            width: 4,
            height: 2,
            format: PixelFormat::Rgb8,
            data: (0..24).collect(),
            timestamp: Instant::now(),
        };
        assert_eq!(frame.byte_len(), 24);
        assert_eq!(frame.row(1)[0], 12);
    }
}
