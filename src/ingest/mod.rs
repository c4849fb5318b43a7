//! Frame sources.
//!
//! A frame source abstracts a camera or video device into a sequence of
//! `Frame`s. Sources are selected by URI:
//! - `stub://name[?frames=N][&timeout_every=M]`: synthetic source for
//!   tests and hardware-free runs (always available)
//! - device paths such as `/dev/video0`: V4L2 capture (feature
//!   `ingest-v4l2`)
//!
//! Sources hold exclusive ownership of the underlying device handle and
//! release it on drop, on every exit path.

mod camera;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraSource, SourceStats};

use anyhow::Result;

use crate::frame::Frame;

/// Sequence-of-frames contract consumed by the run loop.
pub trait FrameSource {
    /// Capture the next frame.
    ///
    /// `Ok(None)` signals a transient timeout: no frame arrived within the
    /// capture bound and the caller should retry. It does not mean
    /// end-of-stream. Any other failure is an error.
    fn capture(&mut self) -> Result<Option<Frame>>;

    /// Whether the source still expects to produce frames.
    fn is_streaming(&self) -> bool;
}
