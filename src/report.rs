//! Alert reporting.
//!
//! Writes the per-frame detection report to a sink. The run loop calls
//! `report` once per processed frame; the output for a frame is either a
//! single "no detections" line or an alert block listing every detection.

use std::io::{self, Write};

use crate::detect::DetectionBatch;

/// Writes detection reports to an output sink.
pub struct AlertReporter<W: Write> {
    sink: W,
}

impl AlertReporter<io::Stdout> {
    /// Reporter bound to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> AlertReporter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Report the detections for one frame.
    ///
    /// An empty batch produces exactly one line. A non-empty batch
    /// produces one alert header followed by a block per detection. The
    /// sink is flushed before returning so alerts are visible even if the
    /// process is interrupted right after.
    pub fn report(&mut self, batch: &DetectionBatch) -> io::Result<()> {
        if batch.is_empty() {
            writeln!(self.sink, "No detections.")?;
        } else {
            writeln!(self.sink)?;
            writeln!(self.sink, "ALERT! OBJECT DETECTED!")?;
            for detection in batch {
                writeln!(self.sink, "  Label: {}", detection.label)?;
                writeln!(self.sink, "  Confidence: {:.2}", detection.confidence)?;
                writeln!(
                    self.sink,
                    "  Bounding Box: Left={:.2}, Top={:.2}, Right={:.2}, Bottom={:.2}",
                    detection.bbox.left,
                    detection.bbox.top,
                    detection.bbox.right,
                    detection.bbox.bottom
                )?;
                writeln!(self.sink, "  --------------------")?;
            }
        }
        self.sink.flush()
    }

    /// Consume the reporter and return the sink. Used by tests.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
