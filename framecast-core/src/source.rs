//! Frame source seam.
//!
//! Real screen capture (DXGI, PrintWindow, …) lives outside this
//! crate; the broadcast session only needs something that yields one
//! [`RawFrame`] per call. [`TestPatternSource`] is the in-crate
//! implementation used by the host binary and the tests.

use std::time::Instant;

use crate::error::CastError;
use crate::frame::{PixelFormat, RawFrame, WindowHandle};

// ── FrameSource ──────────────────────────────────────────────────

/// Produces one raw frame per call.
///
/// A capture failure is fatal to the whole broadcast session — with
/// no frame source there is nothing to broadcast.
pub trait FrameSource: Send {
    /// Capture the next frame of the target window.
    fn capture(&mut self) -> Result<RawFrame, CastError>;

    /// The window this source captures.
    fn window(&self) -> WindowHandle;
}

// ── TestPatternSource ────────────────────────────────────────────

/// Deterministic synthetic source: a horizontal gradient that shifts
/// one pixel per frame, so consecutive frames differ and a given
/// frame index always produces identical bytes.
pub struct TestPatternSource {
    window: WindowHandle,
    width: u32,
    height: u32,
    frame_index: u64,
}

impl TestPatternSource {
    pub fn new(window: WindowHandle, width: u32, height: u32) -> Self {
        Self {
            window,
            width,
            height,
            frame_index: 0,
        }
    }

    /// Frames produced so far.
    pub fn frames_captured(&self) -> u64 {
        self.frame_index
    }
}

impl FrameSource for TestPatternSource {
    fn capture(&mut self) -> Result<RawFrame, CastError> {
        let format = PixelFormat::Rgb8;
        let mut data = Vec::with_capacity(RawFrame::expected_len(self.width, self.height, format));

        let shift = self.frame_index as u32;
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push((self.frame_index % 256) as u8);
            }
        }

        self.frame_index += 1;
        Ok(RawFrame {
            width: self.width,
            height: self.height,
            format,
            data,
            timestamp: Instant::now(),
        })
    }

    fn window(&self) -> WindowHandle {
        self.window
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_deterministic_per_index() {
        let mut a = TestPatternSource::new(WindowHandle(1), 8, 8);
        let mut b = TestPatternSource::new(WindowHandle(2), 8, 8);
        assert_eq!(a.capture().unwrap().data, b.capture().unwrap().data);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut src = TestPatternSource::new(WindowHandle(1), 8, 8);
        let first = src.capture().unwrap();
        let second = src.capture().unwrap();
        assert_ne!(first.data, second.data);
        assert_eq!(src.frames_captured(), 2);
    }

    #[test]
    fn frame_has_expected_size() {
        let mut src = TestPatternSource::new(WindowHandle(1), 16, 4);
        let frame = src.capture().unwrap();
        assert_eq!(frame.byte_len(), 16 * 4 * 3);
    }
}
