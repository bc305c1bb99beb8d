mod config;
mod controller;
mod error;
mod features;
mod input;
mod message;
mod model_download;
mod pipeline;
mod render;
mod stability;
mod types;

use anyhow::Result;

use crate::{
    config::{AppConfig, InputConfig},
    controller::{
        FrameLoop, FrameSource, HistoryScope, LandmarkDetector, Renderer, RunSummary,
        SignClassifier, SignContext,
    },
    input::{QuitSender, quit_channel, spawn_stdin_watcher},
    model_download::{ModelKind, ensure_model_ready},
    pipeline::{HandposeDetector, ImageReplay, OrtSignClassifier, TimedClassifier, TimedDetector},
    render::HeadlessRenderer,
};

const DEFAULT_LOG_FILTER: &str = "info";

/// Logger settings read from `filter_var`, showing info and above when unset.
fn log_env(filter_var: &str) -> env_logger::Env<'_> {
    env_logger::Env::default().filter_or(filter_var, DEFAULT_LOG_FILTER)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(log_env(env_logger::DEFAULT_FILTER_ENV)).init();

    let cfg = AppConfig::from_args();
    if cfg.list_cameras {
        return list_cameras();
    }

    // Classifier artifacts are the user's responsibility; check them first.
    let classifier = OrtSignClassifier::load(&cfg.model_path, &cfg.labels_path)?;
    log::info!(
        "sign classifier ready with {} labels",
        classifier.labels().len()
    );

    let handpose_path = ensure_model_ready(
        ModelKind::HandposeEstimator,
        &cfg.models_dir,
        cfg.allow_download,
    )?;
    let palm_path = ensure_model_ready(ModelKind::PalmDetector, &cfg.models_dir, cfg.allow_download)?;
    let detector = HandposeDetector::new(&handpose_path, &palm_path, cfg.detector.clone())?;
    log::info!("hand landmark detector ready");

    let detector: Box<dyn LandmarkDetector> = match cfg.timeouts.detect {
        Some(timeout) => Box::new(TimedDetector::spawn(detector, timeout)?),
        None => Box::new(detector),
    };
    let classifier: Box<dyn SignClassifier> = match cfg.timeouts.classify {
        Some(timeout) => Box::new(TimedClassifier::spawn(classifier, timeout)?),
        None => Box::new(classifier),
    };

    let source = open_source(&cfg.input)?;

    let (quit_tx, quit) = quit_channel();
    spawn_stdin_watcher(quit_tx.clone())?;
    let renderer = open_renderer(cfg.headless, quit_tx);
    log::info!("press q then Enter to stop");

    let context = SignContext::new(cfg.stream.scope, cfg.stream.history_capacity);
    let summary = FrameLoop::new(source, detector, classifier, renderer, quit, context).run();
    print_summary(&summary);
    Ok(())
}

fn open_source(input: &InputConfig) -> Result<Box<dyn FrameSource>> {
    match input {
        InputConfig::Replay(dir) => Ok(Box::new(ImageReplay::open(dir)?)),
        InputConfig::Camera(indices) => open_camera(indices),
    }
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(indices: &[u32]) -> Result<Box<dyn FrameSource>> {
    let camera = pipeline::CameraCapture::probe(indices)?;
    log::info!("capturing from camera {}", camera.index());
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(_indices: &[u32]) -> Result<Box<dyn FrameSource>> {
    Err(error::StartupError::CameraSupportDisabled.into())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    Err(error::StartupError::CameraSupportDisabled.into())
}

#[cfg(feature = "display-minifb")]
fn open_renderer(headless: bool, quit_tx: QuitSender) -> Box<dyn Renderer> {
    if headless {
        Box::new(HeadlessRenderer::new())
    } else {
        Box::new(render::WindowRenderer::new(quit_tx))
    }
}

#[cfg(not(feature = "display-minifb"))]
fn open_renderer(headless: bool, _quit_tx: QuitSender) -> Box<dyn Renderer> {
    if !headless {
        log::warn!("built without display support, logging predictions instead");
    }
    Box::new(HeadlessRenderer::new())
}

fn print_summary(summary: &RunSummary) {
    log::info!(
        "stopped ({:?}): {} frames, {} unavailable reads, {} hands classified, {} skipped",
        summary.reason,
        summary.stats.frames,
        summary.stats.unavailable,
        summary.stats.hands_classified,
        summary.stats.hands_skipped,
    );

    match summary.scope {
        HistoryScope::Shared => {
            let text = summary
                .messages
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!("Final message: {text}");
        }
        HistoryScope::PerHand => {
            for (slot, message) in summary.messages.iter().enumerate() {
                println!("Final message (hand {}): {message}", slot + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults_to_info() {
        let logger =
            env_logger::Builder::from_env(log_env("SIGN_SCRIBE_TEST_UNSET_LOG")).build();
        assert_eq!(logger.filter(), log::LevelFilter::Info);
    }
}
