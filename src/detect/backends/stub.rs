use std::collections::VecDeque;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::{DetectorBackend, RawDetection};
use crate::frame::Frame;

/// Stub backend for tests and hardware-free runs.
///
/// Two modes:
/// - scripted: each `infer` pops the next pre-loaded candidate list;
/// - fallback: frame-change detection via pixel hashing. A changed frame
///   yields one full-frame candidate at a fixed confidence.
pub struct StubBackend {
    script: VecDeque<Vec<RawDetection>>,
    last_hash: Option<[u8; 32]>,
}

/// Confidence reported by the frame-change fallback.
const CHANGE_CONFIDENCE: f32 = 0.85;

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            last_hash: None,
        }
    }

    /// Pre-load raw candidate lists, consumed one list per frame.
    pub fn with_script(frames: impl IntoIterator<Item = Vec<RawDetection>>) -> Self {
        Self {
            script: frames.into_iter().collect(),
            last_hash: None,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        if let Some(raw) = self.script.pop_front() {
            return Ok(raw);
        }

        let current_hash: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let changed = match self.last_hash {
            Some(prev) => prev != current_hash,
            None => false,
        };
        self.last_hash = Some(current_hash);

        if changed {
            Ok(vec![RawDetection {
                class_id: 0,
                confidence: CHANGE_CONFIDENCE,
                x1: 0.0,
                y1: 0.0,
                x2: frame.width() as f32,
                y2: frame.height() as f32,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn frame(fill: u8, sequence: u64) -> Frame {
        Frame::new(vec![fill; 4 * 4 * 3], 4, 4, PixelFormat::Rgb8, sequence).unwrap()
    }

    #[test]
    fn scripted_candidates_are_returned_in_order() {
        let raw = RawDetection {
            class_id: 1,
            confidence: 0.9,
            x1: 1.0,
            y1: 2.0,
            x2: 3.0,
            y2: 4.0,
        };
        let mut backend = StubBackend::with_script([vec![raw], vec![]]);
        assert_eq!(backend.infer(&frame(0, 1)).unwrap(), vec![raw]);
        assert!(backend.infer(&frame(0, 2)).unwrap().is_empty());
    }

    #[test]
    fn fallback_detects_frame_changes() {
        let mut backend = StubBackend::new();

        // First frame: nothing to compare against.
        assert!(backend.infer(&frame(1, 1)).unwrap().is_empty());
        // Changed content yields one full-frame candidate.
        let raw = backend.infer(&frame(2, 2)).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].confidence, CHANGE_CONFIDENCE);
        // Unchanged content is quiet again.
        assert!(backend.infer(&frame(2, 3)).unwrap().is_empty());
    }
}
