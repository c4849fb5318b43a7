//! In-memory image frames.
//!
//! A `Frame` is one captured image from a frame source. The pixel buffer is
//! private; sources construct frames and the detector reads pixels through
//! the accessor. Frames are owned by the run loop for exactly one cycle and
//! dropped after detection.

use anyhow::{anyhow, Result};

/// Pixel layout of a frame buffer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel, row-major.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// One captured image frame.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Capture sequence number assigned by the source (1-based).
    pub sequence: u64,
}

impl Frame {
    /// Create a frame, validating the buffer length against the dimensions.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer length {} does not match {}x{} {:?} (expected {})",
                data.len(),
                width,
                height,
                format,
                expected
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            sequence,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}
