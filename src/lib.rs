//! Camera watch pipeline: capture frames from a camera, run object
//! detection on each one, and print an alert for every detection above a
//! confidence threshold.
//!
//! The crate is organized around four components:
//! - [`ingest`]: frame sources behind the [`FrameSource`] trait
//! - [`detect`]: the [`Detector`] and its pluggable inference backends
//! - [`report`]: the [`AlertReporter`] output sink
//! - [`runner`]: the [`Runner`] loop tying them together
//!
//! `skywatchd` is the daemon binary wrapping the loop with CLI, config,
//! signal handling, and logging.

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod report;
pub mod runner;

pub use config::{BackendKind, ConfigOverrides, WatchConfig};
pub use detect::{
    BoundingBox, Detection, DetectionBatch, Detector, DetectorBackend, LabelTable, RawDetection,
    UNKNOWN_LABEL,
};
pub use error::WatchError;
pub use frame::{Frame, PixelFormat};
pub use ingest::{CameraSource, FrameSource, SourceStats};
pub use report::AlertReporter;
pub use runner::{RunState, RunSummary, Runner};
