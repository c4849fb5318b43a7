use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use skywatch::detect::backends::StubBackend;
use skywatch::{
    AlertReporter, Detection, DetectionBatch, Detector, Frame, FrameSource, LabelTable,
    PixelFormat, RawDetection, RunState, Runner, WatchError,
};

enum Step {
    Frame,
    Timeout,
    Fail(&'static str),
}

/// Frame source driven by a fixed script of capture outcomes. The stream
/// ends when the script is exhausted.
struct ScriptedSource {
    steps: VecDeque<Step>,
    sequence: u64,
}

impl ScriptedSource {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            sequence: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Option<Frame>> {
        match self.steps.pop_front() {
            Some(Step::Frame) => {
                self.sequence += 1;
                let frame = Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, PixelFormat::Rgb8, self.sequence)?;
                Ok(Some(frame))
            }
            Some(Step::Timeout) => Ok(None),
            Some(Step::Fail(msg)) => Err(anyhow!("{}", msg)),
            None => Ok(None),
        }
    }

    fn is_streaming(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Write sink shared with the test so output survives the runner.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn labels() -> LabelTable {
    LabelTable::from_lines(["BACKGROUND", "bird", "cat"]).unwrap()
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

fn detector(script: Vec<Vec<RawDetection>>, threshold: f32) -> Detector {
    Detector::from_parts(Box::new(StubBackend::with_script(script)), labels(), threshold)
}

#[test]
fn stream_end_stops_the_loop_cleanly() {
    let source = ScriptedSource::new([Step::Frame, Step::Frame]);
    let det = detector(vec![vec![], vec![]], 0.8);
    let sink = SharedSink::default();
    let mut runner = Runner::new(source, det, AlertReporter::new(sink.clone()));
    assert_eq!(runner.state(), RunState::Init);

    let summary = runner.run().expect("clean run");

    assert_eq!(runner.state(), RunState::Stopped);
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(summary.detections_reported, 0);
    assert!(!summary.interrupted);
    assert_eq!(sink.contents(), "No detections.\nNo detections.\n");
}

#[test]
fn capture_timeouts_are_retried_not_fatal() {
    let source = ScriptedSource::new([Step::Timeout, Step::Frame, Step::Timeout, Step::Frame]);
    let det = detector(vec![vec![], vec![]], 0.8);
    let sink = SharedSink::default();
    let mut runner = Runner::new(source, det, AlertReporter::new(sink.clone()));

    let summary = runner.run().expect("timeouts are transient");

    assert_eq!(summary.frames_processed, 2);
    assert_eq!(sink.contents().matches("No detections.").count(), 2);
}

#[test]
fn interrupt_requested_before_start_stops_immediately() {
    let source = ScriptedSource::new([Step::Frame, Step::Frame]);
    let det = detector(vec![vec![], vec![]], 0.8);
    let mut runner = Runner::new(source, det, AlertReporter::new(SharedSink::default()));

    runner.shutdown_flag().store(true, Ordering::SeqCst);
    let summary = runner.run().expect("interrupt is a clean stop");

    assert!(summary.interrupted);
    assert_eq!(summary.frames_processed, 0);
    assert_eq!(runner.state(), RunState::Stopped);
}

#[test]
fn interrupt_mid_run_stops_within_one_iteration() {
    /// Produces frames forever, storing `true` into the shared flag once
    /// the second frame has been handed out.
    struct InterruptingSource {
        sequence: u64,
        flag: Arc<Mutex<Option<Arc<std::sync::atomic::AtomicBool>>>>,
    }

    impl FrameSource for InterruptingSource {
        fn capture(&mut self) -> Result<Option<Frame>> {
            self.sequence += 1;
            if self.sequence == 2 {
                if let Some(flag) = self.flag.lock().unwrap().as_ref() {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            let frame = Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, PixelFormat::Rgb8, self.sequence)?;
            Ok(Some(frame))
        }

        fn is_streaming(&self) -> bool {
            true
        }
    }

    let slot: Arc<Mutex<Option<Arc<std::sync::atomic::AtomicBool>>>> = Arc::default();
    let source = InterruptingSource {
        sequence: 0,
        flag: slot.clone(),
    };
    let det = detector(vec![vec![], vec![]], 0.8);
    let mut runner = Runner::new(source, det, AlertReporter::new(SharedSink::default()));
    *slot.lock().unwrap() = Some(runner.shutdown_flag());

    let summary = runner.run().expect("interrupt is a clean stop");

    // The flag is raised while frame 2 is captured; that frame is still
    // processed and the very next iteration stops.
    assert!(summary.interrupted);
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(runner.state(), RunState::Stopped);
}

#[test]
fn source_failure_stops_the_loop_with_an_error() {
    let source = ScriptedSource::new([Step::Frame, Step::Fail("device disconnected")]);
    let det = detector(vec![vec![]], 0.8);
    let sink = SharedSink::default();
    let mut runner = Runner::new(source, det, AlertReporter::new(sink.clone()));

    let err = runner.run().unwrap_err();

    assert!(matches!(err, WatchError::Runtime(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(runner.state(), RunState::Stopped);
    // The frame before the failure was still reported.
    assert_eq!(sink.contents(), "No detections.\n");
}

#[test]
fn detections_above_threshold_are_reported_as_alerts() {
    let source = ScriptedSource::new([Step::Frame]);
    let det = detector(vec![vec![raw(1, 0.93), raw(2, 0.85)]], 0.8);
    let sink = SharedSink::default();
    let mut runner = Runner::new(source, det, AlertReporter::new(sink.clone()));

    let summary = runner.run().expect("clean run");
    let out = sink.contents();

    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.detections_reported, 2);
    assert_eq!(out.matches("ALERT! OBJECT DETECTED!").count(), 1);
    assert!(out.contains("  Label: bird"));
    assert!(out.contains("  Label: cat"));
    assert!(out.contains("  Confidence: 0.93"));
    assert!(out.contains("  Bounding Box: Left=10.00, Top=20.00, Right=110.00, Bottom=220.00"));
}

#[test]
fn lower_threshold_reports_what_a_higher_one_suppresses() {
    let run_with_threshold = |threshold: f32| {
        let source = ScriptedSource::new([Step::Frame]);
        let det = detector(vec![vec![raw(1, 0.6)]], threshold);
        let sink = SharedSink::default();
        let mut runner = Runner::new(source, det, AlertReporter::new(sink.clone()));
        let summary = runner.run().expect("clean run");
        (summary, sink.contents())
    };

    let (strict, strict_out) = run_with_threshold(0.8);
    assert_eq!(strict.detections_reported, 0);
    assert_eq!(strict_out, "No detections.\n");

    let (lenient, lenient_out) = run_with_threshold(0.5);
    assert_eq!(lenient.detections_reported, 1);
    assert!(lenient_out.contains("ALERT! OBJECT DETECTED!"));
    assert!(lenient_out.contains("  Label: bird"));
}

#[test]
fn detection_failure_stops_the_loop() {
    struct FailingBackend;

    impl skywatch::DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
            Err(anyhow!("inference engine fault"))
        }
    }

    let source = ScriptedSource::new([Step::Frame, Step::Frame]);
    let det = Detector::from_parts(Box::new(FailingBackend), labels(), 0.8);
    let mut runner = Runner::new(source, det, AlertReporter::new(SharedSink::default()));

    let err = runner.run().unwrap_err();
    assert!(matches!(err, WatchError::Runtime(_)));
}

#[test]
fn batch_reporting_matches_reporter_contract() {
    let mut batch = DetectionBatch::default();
    batch.push(Detection {
        class_id: 1,
        label: "bird".to_string(),
        confidence: 0.9,
        bbox: skywatch::BoundingBox::from_corners(0.0, 0.0, 8.0, 8.0),
    });

    let sink = SharedSink::default();
    let mut reporter = AlertReporter::new(sink.clone());
    reporter.report(&batch).unwrap();

    assert!(sink.contents().starts_with("\nALERT! OBJECT DETECTED!\n"));
}
