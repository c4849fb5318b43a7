#![cfg(feature = "backend-tract")]

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::config::ModelSettings;
use crate::detect::backend::{DetectorBackend, RawDetection};
use crate::detect::result::BoundingBox;
use crate::frame::Frame;

/// IoU above which two same-class candidates are considered duplicates.
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Scores below this floor are not decoded at all; the user-facing
/// confidence threshold is applied by the `Detector` wrapper on top.
const DECODE_FLOOR: f32 = 0.05;

/// Tract-based backend for ONNX SSD inference.
///
/// The model graph is bound by the configured input/output tensor names.
/// Frames are resized to the model input size, normalized to [0, 1] NCHW
/// f32, and the scores/boxes outputs are decoded into per-class candidates
/// with greedy non-max suppression.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(&settings.path)
            .with_context(|| {
                format!(
                    "failed to load ONNX model from {}",
                    settings.path.display()
                )
            })?
            .with_input_names([settings.input_blob.as_str()])
            .with_context(|| {
                format!(
                    "input blob '{}' not found in model graph",
                    settings.input_blob
                )
            })?
            .with_output_names([settings.output_cvg.as_str(), settings.output_bbox.as_str()])
            .with_context(|| {
                format!(
                    "output blobs '{}'/'{}' not found in model graph",
                    settings.output_cvg, settings.output_bbox
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        3,
                        settings.input_height as usize,
                        settings.input_width as usize
                    ),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width: settings.input_width,
            input_height: settings.input_height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let pixels = resize_rgb(
            frame.pixels(),
            frame.width(),
            frame.height(),
            self.input_width,
            self.input_height,
        )?;

        let width = self.input_width as usize;
        let height = self.input_height as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<RawDetection>> {
        let scores = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no coverage output"))?
            .to_array_view::<f32>()
            .context("coverage output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("coverage output was not [batch, anchors, classes]")?;
        let boxes = outputs
            .get(1)
            .ok_or_else(|| anyhow!("model produced no bounding-box output"))?
            .to_array_view::<f32>()
            .context("bounding-box output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("bounding-box output was not [batch, anchors, 4]")?;

        let anchors = scores.shape()[1];
        let classes = scores.shape()[2];
        if boxes.shape()[1] != anchors || boxes.shape()[2] != 4 {
            return Err(anyhow!(
                "output shape mismatch: scores {:?} vs boxes {:?}",
                scores.shape(),
                boxes.shape()
            ));
        }

        let frame_w = frame.width() as f32;
        let frame_h = frame.height() as f32;
        let mut candidates = Vec::new();
        for n in 0..anchors {
            // Class 0 is the background slot in the SSD convention.
            let mut best_class = 0usize;
            let mut best_score = 0.0f32;
            for c in 1..classes {
                let score = scores[[0, n, c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_class == 0 || best_score < DECODE_FLOOR {
                continue;
            }
            // Box corners are normalized [0, 1]; scale to frame pixels.
            let x1 = (boxes[[0, n, 0]] * frame_w).clamp(0.0, frame_w);
            let y1 = (boxes[[0, n, 1]] * frame_h).clamp(0.0, frame_h);
            let x2 = (boxes[[0, n, 2]] * frame_w).clamp(0.0, frame_w);
            let y2 = (boxes[[0, n, 3]] * frame_h).clamp(0.0, frame_h);
            candidates.push(RawDetection {
                class_id: best_class,
                confidence: best_score,
                x1,
                y1,
                x2,
                y2,
            });
        }

        Ok(non_max_suppress(candidates, NMS_IOU_THRESHOLD))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }
}

/// Nearest-neighbor resize of a packed RGB buffer.
fn resize_rgb(
    pixels: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>> {
    let expected = (src_w as usize) * (src_h as usize) * 3;
    if pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGB bytes, received {}",
            expected,
            pixels.len()
        ));
    }
    if src_w == dst_w && src_h == dst_h {
        return Ok(pixels.to_vec());
    }

    let mut out = vec![0u8; (dst_w as usize) * (dst_h as usize) * 3];
    for y in 0..dst_h as usize {
        let src_y = (y * src_h as usize) / dst_h as usize;
        for x in 0..dst_w as usize {
            let src_x = (x * src_w as usize) / dst_w as usize;
            let src_idx = (src_y * src_w as usize + src_x) * 3;
            let dst_idx = (y * dst_w as usize + x) * 3;
            out[dst_idx..dst_idx + 3].copy_from_slice(&pixels[src_idx..src_idx + 3]);
        }
    }
    Ok(out)
}

/// Greedy per-class non-max suppression, highest confidence first.
fn non_max_suppress(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let cand_box = BoundingBox::from_corners(cand.x1, cand.y1, cand.x2, cand.y2);
        let duplicate = kept.iter().any(|k| {
            k.class_id == cand.class_id
                && BoundingBox::from_corners(k.x1, k.y1, k.x2, k.y2).iou(&cand_box)
                    > iou_threshold
        });
        if !duplicate {
            kept.push(cand);
        }
    }
    kept
}
