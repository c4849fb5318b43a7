//! Run loop.
//!
//! Drives the capture -> detect -> report pipeline until the source ends,
//! an interrupt is requested, or a component fails. The loop owns its
//! source, detector, and reporter exclusively; dropping the runner (on
//! any exit path) releases the underlying device and model resources.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detect::Detector;
use crate::error::WatchError;
use crate::ingest::{CameraSource, FrameSource};
use crate::report::AlertReporter;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Lifecycle state of the run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Init,
    Running,
    Stopped,
}

/// Totals reported after a run completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub detections_reported: u64,
    /// True when the run ended because an interrupt was requested rather
    /// than because the source stopped streaming.
    pub interrupted: bool,
}

/// The watch loop: one source, one detector, one reporter.
pub struct Runner<S: FrameSource, W: Write> {
    source: S,
    detector: Detector,
    reporter: AlertReporter<W>,
    shutdown: Arc<AtomicBool>,
    state: RunState,
}

impl<S: FrameSource, W: Write> Runner<S, W> {
    pub fn new(source: S, detector: Detector, reporter: AlertReporter<W>) -> Self {
        Self {
            source,
            detector,
            reporter,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: RunState::Init,
        }
    }

    /// Flag observed at the top of every iteration. Store `true` (from a
    /// signal handler or another thread) to request a clean stop.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Process frames until end-of-stream, interrupt, or failure.
    ///
    /// A capture timeout is retried, not treated as an error. Any other
    /// component failure stops the loop immediately and is returned to
    /// the caller. The loop always leaves the runner in `Stopped`.
    pub fn run(&mut self) -> Result<RunSummary, WatchError> {
        self.state = RunState::Running;
        let mut summary = RunSummary::default();
        let result = self.run_inner(&mut summary);
        self.state = RunState::Stopped;
        result.map(|()| summary)
    }

    fn run_inner(&mut self, summary: &mut RunSummary) -> Result<(), WatchError> {
        let mut last_health_log = Instant::now();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                log::info!("Runner: interrupt requested, stopping");
                summary.interrupted = true;
                return Ok(());
            }

            match self.source.capture() {
                Ok(Some(frame)) => {
                    let batch = self.detector.detect(&frame)?;
                    self.reporter
                        .report(&batch)
                        .map_err(|err| WatchError::Runtime(err.into()))?;
                    summary.frames_processed += 1;
                    summary.detections_reported += batch.len() as u64;
                }
                // Transient timeout: no frame this round, try again.
                Ok(None) => {
                    log::debug!("Runner: capture timed out, retrying");
                }
                Err(err) => {
                    return Err(WatchError::Runtime(err));
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "Runner: {} frames processed, {} detections reported",
                    summary.frames_processed,
                    summary.detections_reported
                );
                last_health_log = Instant::now();
            }

            if !self.source.is_streaming() {
                log::info!("Runner: source ended after {} frames", summary.frames_processed);
                return Ok(());
            }
        }
    }
}

impl<W: Write> Runner<CameraSource, W> {
    /// Capture statistics of the underlying camera source.
    pub fn source_stats(&self) -> crate::ingest::SourceStats {
        self.source.stats()
    }
}
