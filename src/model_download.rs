use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

use crate::error::StartupError;

pub const DEFAULT_MODELS_DIR: &str = "models";

/// The two MediaPipe models behind hand-landmark detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandposeEstimator,
    PalmDetector,
}

impl ModelKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::HandposeEstimator => "handpose_estimation_mediapipe_2023feb.onnx",
            Self::PalmDetector => "palm_detection_mediapipe_2023feb.onnx",
        }
    }

    fn url(self) -> &'static str {
        match self {
            Self::HandposeEstimator => {
                "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/handpose_estimation_mediapipe_2023feb.onnx"
            }
            Self::PalmDetector => {
                "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/palm_detection_mediapipe_2023feb.onnx"
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HandposeEstimator => "handpose estimator model",
            Self::PalmDetector => "palm detector model",
        }
    }

    pub fn path_in(self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.file_name())
    }
}

/// Returns the model path, downloading the model first when it is missing and
/// downloads are allowed.
pub fn ensure_model_ready(kind: ModelKind, models_dir: &Path, allow_download: bool) -> Result<PathBuf> {
    let model_path = kind.path_in(models_dir);
    if model_path.exists() {
        log::debug!("{} present at {}", kind.label(), model_path.display());
        return Ok(model_path);
    }
    if !allow_download {
        return Err(StartupError::MissingArtifact {
            what: kind.label(),
            path: model_path,
        }
        .into());
    }

    fs::create_dir_all(models_dir)
        .with_context(|| format!("failed to create model directory {}", models_dir.display()))?;
    download_to_path(kind, &model_path)
        .with_context(|| format!("failed to download {} to {}", kind.label(), model_path.display()))?;
    Ok(model_path)
}

fn download_to_path(kind: ModelKind, dest: &Path) -> Result<()> {
    let url = kind.url();
    log::info!("downloading {} from {url} to {}", kind.label(), dest.display());

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = create_progress_bar(response.content_length());
    save_stream(&mut response, dest, &progress)?;
    progress.finish_with_message(format!("{} ready", kind.label()));
    Ok(())
}

/// Streams `reader` into `dest` through a `.download` sibling that is moved
/// into place on success and removed on failure.
fn save_stream(reader: &mut impl Read, dest: &Path, progress: &ProgressBar) -> Result<()> {
    let tmp_path = dest.with_extension("download");
    let result = write_and_rename(reader, &tmp_path, dest, progress);
    if result.is_err() && tmp_path.exists() {
        if let Err(err) = fs::remove_file(&tmp_path) {
            log::warn!("failed to remove partial download {}: {err}", tmp_path.display());
        }
    }
    result
}

fn write_and_rename(
    reader: &mut impl Read,
    tmp_path: &Path,
    dest: &Path,
    progress: &ProgressBar,
) -> Result<()> {
    let mut file = fs::File::create(tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    drop(file);
    fs::rename(tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
            pb.set_style(style);
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} downloading model")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
