//! facecast - detect faces on a camera feed and publish annotated frames
//!
//! Startup order:
//! 1. Resolve configuration (flags, environment, config file)
//! 2. Connect the exporter (fail fast before touching the camera)
//! 3. Load the classifier and open the camera
//! 4. Capture, annotate, publish, display

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use facecast::config::{Args, FacecastConfig};
use facecast::pipeline::WINDOW_TITLE;
use facecast::{
    detect, display, export, CameraSource, CaptureLoop, Pipeline, RectangleMarker, RunMode,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = FacecastConfig::load(&args).context("invalid configuration")?;

    log::info!(
        "facecast {} starting: device={}, classifier={}, endpoint={} ({}), topic={}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.device,
        cfg.classifier,
        cfg.exporter.endpoint,
        cfg.exporter.transport,
        cfg.exporter.topic
    );

    let exporter = export::connect(&cfg.exporter)
        .with_context(|| format!("failed to connect to {}", cfg.exporter.endpoint))?;

    let detector = detect::load(&cfg.classifier)
        .with_context(|| format!("failed to load classifier {}", cfg.classifier))?;
    let source = CameraSource::open(&cfg.camera)
        .with_context(|| format!("failed to open camera {}", cfg.camera.device))?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let capture =
        CaptureLoop::new(source, detector, cfg.retry).with_shutdown(Arc::clone(&shutdown));

    let sink = display::open(WINDOW_TITLE, cfg.headless);

    if cfg.run_mode == RunMode::Continuous {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                log::warn!("second interrupt, exiting immediately");
                std::process::exit(130);
            }
            log::info!("interrupt received, stopping after the current cycle or retry");
        })
        .context("error setting Ctrl-C handler")?;
        log::info!("running continuously; press Ctrl-C to stop");
    }

    let mut pipeline = Pipeline::new(capture, RectangleMarker, exporter, sink, cfg.marker);
    let summary = pipeline
        .run(cfg.run_mode, &shutdown)
        .context("capture pipeline failed")?;

    log::info!(
        "facecast finished: {} cycles, {} faces published",
        summary.cycles,
        summary.faces
    );
    Ok(())
}
