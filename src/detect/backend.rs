use anyhow::Result;

use crate::frame::Frame;

/// Raw candidate emitted by a backend before threshold filtering.
///
/// Corners are in frame pixel coordinates and may arrive in any order;
/// the `Detector` wrapper normalizes them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Inference engine seam.
///
/// A backend consumes one frame and yields raw candidates. It performs
/// the actual algorithmic work (preprocessing, inference, box decoding,
/// non-max suppression); the wrapper above it applies the confidence
/// threshold and resolves labels.
///
/// Implementations must be deterministic for a fixed model and frame and
/// must not retain the pixel slice beyond the `infer` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
