//! skywatchd - camera watch daemon
//!
//! This daemon:
//! 1. Loads the detection model and class label table
//! 2. Opens the configured camera source
//! 3. Captures frames and runs detection on each one
//! 4. Prints an alert block for every detection above the threshold
//! 5. Stops cleanly on end-of-stream or SIGINT

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;

use skywatch::{AlertReporter, CameraSource, ConfigOverrides, Detector, Runner, WatchConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a camera and alert on detected objects")]
struct Args {
    /// Path to the detection model.
    #[arg(long, env = "SKYWATCH_MODEL")]
    model: Option<PathBuf>,

    /// Path to the class label file (one label per line).
    #[arg(long, env = "SKYWATCH_LABELS")]
    labels: Option<PathBuf>,

    /// Camera device path or stream URI (e.g. /dev/video0, stub://camera).
    #[arg(long, env = "SKYWATCH_CAMERA")]
    camera: Option<String>,

    /// Minimum confidence for a detection to be reported, in [0.0, 1.0].
    #[arg(long, env = "SKYWATCH_THRESHOLD")]
    threshold: Option<f32>,

    /// Name of the model's input tensor.
    #[arg(long, env = "SKYWATCH_INPUT_BLOB")]
    input_blob: Option<String>,

    /// Name of the model's coverage/scores output tensor.
    #[arg(long, env = "SKYWATCH_OUTPUT_CVG")]
    output_cvg: Option<String>,

    /// Name of the model's bounding-box output tensor.
    #[arg(long, env = "SKYWATCH_OUTPUT_BBOX")]
    output_bbox: Option<String>,

    /// Inference backend: 'tract' (default) or 'stub'.
    #[arg(long, env = "SKYWATCH_BACKEND")]
    backend: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => {}
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(err.exit_code());
        }
    }
}

fn run(args: Args) -> Result<(), skywatch::WatchError> {
    let overrides = ConfigOverrides {
        model: args.model,
        labels: args.labels,
        camera: args.camera,
        threshold: args.threshold,
        input_blob: args.input_blob,
        output_cvg: args.output_cvg,
        output_bbox: args.output_bbox,
        backend: args.backend,
    };
    let config = WatchConfig::load(overrides)?;

    log::info!("skywatchd {} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "model={} labels={} backend={}",
        config.model.path.display(),
        config.model.labels_path.display(),
        config.backend.as_str()
    );
    log::info!(
        "camera={} threshold={:.2}",
        config.camera.uri,
        config.threshold
    );

    // Model load failures should surface before the device is opened.
    let detector = Detector::load(&config)?;
    log::info!(
        "detector ready: backend={} labels={}",
        detector.backend_name(),
        detector.label_count()
    );
    let source = CameraSource::open(&config.camera)?;

    let mut runner = Runner::new(source, detector, AlertReporter::stdout());

    install_interrupt_handler(runner.shutdown_flag()).map_err(skywatch::WatchError::Runtime)?;

    let summary = runner.run()?;
    let stats = runner.source_stats();
    if summary.interrupted {
        log::info!("interrupted; shutting down");
    }
    log::info!(
        "done: {} frames from {}, {} detections reported",
        summary.frames_processed,
        stats.uri,
        summary.detections_reported
    );
    Ok(())
}

fn install_interrupt_handler(
    shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> Result<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })?;
    Ok(())
}
