//! Object detection.
//!
//! `Detector` is the contract the run loop sees: load a model and labels,
//! consume a frame, produce a filtered `DetectionBatch`. The actual
//! inference engine sits behind the `DetectorBackend` trait; threshold
//! filtering, box normalization, and label resolution happen here so the
//! reported-detection invariants hold regardless of backend.

mod backend;
pub mod backends;
mod labels;
mod result;

pub use backend::{DetectorBackend, RawDetection};
pub use labels::{LabelTable, UNKNOWN_LABEL};
pub use result::{BoundingBox, Detection, DetectionBatch};

use anyhow::Result;

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::frame::Frame;

/// A loaded detector: backend + label table + confidence threshold.
///
/// Owned exclusively by the run loop. Deterministic for a fixed backend
/// and frame.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    labels: LabelTable,
    threshold: f32,
}

impl Detector {
    /// Construct the detector from configuration. Fails with `ModelLoad`
    /// when the model or labels cannot be loaded or blob names are not
    /// found in the model graph.
    pub fn load(config: &WatchConfig) -> Result<Self, WatchError> {
        let labels =
            LabelTable::from_path(&config.model.labels_path).map_err(WatchError::ModelLoad)?;
        let mut backend = backends::build(config).map_err(WatchError::ModelLoad)?;
        backend.warm_up().map_err(WatchError::ModelLoad)?;
        Ok(Self {
            backend,
            labels,
            threshold: config.threshold,
        })
    }

    /// Construct from parts. Used by tests and embedders.
    pub fn from_parts(
        backend: Box<dyn DetectorBackend>,
        labels: LabelTable,
        threshold: f32,
    ) -> Self {
        Self {
            backend,
            labels,
            threshold,
        }
    }

    /// Run detection on one frame.
    ///
    /// Raw candidates below the threshold (or with non-finite confidence)
    /// are dropped before the batch is returned; box corners are
    /// normalized. An out-of-range class id resolves to the placeholder
    /// label with a logged warning.
    pub fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        let raw = self.backend.infer(frame)?;
        let mut batch = DetectionBatch::default();
        for cand in raw {
            if !cand.confidence.is_finite() || cand.confidence < self.threshold {
                continue;
            }
            let label = match self.labels.get(cand.class_id) {
                Ok(label) => label.to_string(),
                Err(err) => {
                    log::warn!("label lookup failed, using placeholder: {}", err);
                    UNKNOWN_LABEL.to_string()
                }
            };
            batch.push(Detection {
                class_id: cand.class_id,
                label,
                confidence: cand.confidence,
                bbox: BoundingBox::from_corners(cand.x1, cand.y1, cand.x2, cand.y2),
            });
        }
        Ok(batch)
    }

    /// Look up a class label by id.
    pub fn class_label(&self, class_id: usize) -> Result<&str, WatchError> {
        self.labels.get(class_id)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Number of entries in the label table.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, PixelFormat::Rgb8, 1).unwrap()
    }

    fn labels() -> LabelTable {
        LabelTable::from_lines(["BACKGROUND", "bird"]).unwrap()
    }

    fn raw(class_id: usize, confidence: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            x1: 10.0,
            y1: 20.0,
            x2: 110.0,
            y2: 220.0,
        }
    }

    #[test]
    fn below_threshold_candidates_are_filtered() {
        let backend = backends::StubBackend::with_script([vec![raw(1, 0.5), raw(1, 0.93)]]);
        let mut detector = Detector::from_parts(Box::new(backend), labels(), 0.8);

        let batch = detector.detect(&frame()).unwrap();
        assert_eq!(batch.len(), 1);
        let only = batch.iter().next().unwrap();
        assert_eq!(only.confidence, 0.93);
        assert!(batch.iter().all(|d| d.confidence >= detector.threshold()));
    }

    #[test]
    fn non_finite_confidence_is_dropped() {
        let backend = backends::StubBackend::with_script([vec![raw(1, f32::NAN)]]);
        let mut detector = Detector::from_parts(Box::new(backend), labels(), 0.0);
        assert!(detector.detect(&frame()).unwrap().is_empty());
    }

    #[test]
    fn box_corners_are_normalized() {
        let swapped = RawDetection {
            class_id: 1,
            confidence: 0.9,
            x1: 110.0,
            y1: 220.0,
            x2: 10.0,
            y2: 20.0,
        };
        let backend = backends::StubBackend::with_script([vec![swapped]]);
        let mut detector = Detector::from_parts(Box::new(backend), labels(), 0.8);

        let batch = detector.detect(&frame()).unwrap();
        let only = batch.iter().next().unwrap();
        assert!(only.bbox.left <= only.bbox.right);
        assert!(only.bbox.top <= only.bbox.bottom);
        assert_eq!(only.bbox.left, 10.0);
        assert_eq!(only.bbox.bottom, 220.0);
    }

    #[test]
    fn unknown_class_resolves_to_placeholder() {
        let backend = backends::StubBackend::with_script([vec![raw(42, 0.95)]]);
        let mut detector = Detector::from_parts(Box::new(backend), labels(), 0.8);

        let batch = detector.detect(&frame()).unwrap();
        assert_eq!(batch.iter().next().unwrap().label, UNKNOWN_LABEL);
    }

    #[test]
    fn class_label_is_typed_on_out_of_range() {
        let backend = backends::StubBackend::new();
        let detector = Detector::from_parts(Box::new(backend), labels(), 0.8);
        assert_eq!(detector.class_label(1).unwrap(), "bird");
        assert!(matches!(
            detector.class_label(9),
            Err(WatchError::UnknownClass { class_id: 9, .. })
        ));
    }
}
