use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the program before the frame loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{what} not found at {} (looked in {})", .path.display(), parent_dir(.path))]
    MissingArtifact { what: &'static str, path: PathBuf },

    #[error("failed to read {what} at {}", .path.display())]
    UnreadableArtifact {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load {what} from {}", .path.display())]
    ModelLoad {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("label table at {} contains no labels", .path.display())]
    EmptyLabelTable { path: PathBuf },

    #[error("no camera could be opened (probed indices {tried:?})")]
    NoCamera { tried: Vec<u32> },

    #[error("built without camera support; rebuild with the `camera-nokhwa` feature or pass --replay <dir>")]
    CameraSupportDisabled,
}

fn parent_dir(path: &std::path::Path) -> String {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
        _ => ".".to_string(),
    }
}

/// A hand whose keypoints cannot be turned into a classifier input.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FeatureShapeMismatch {
    #[error("expected 21 keypoints, got {0}")]
    KeypointCount(usize),
    #[error("expected 63 features, got {0}")]
    VectorLength(usize),
}
