use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    controller::HistoryScope,
    model_download::DEFAULT_MODELS_DIR,
    pipeline::{
        classifier::{DEFAULT_LABELS_PATH, DEFAULT_MODEL_PATH},
        landmarks::DetectorConfig,
    },
    stability::DEFAULT_HISTORY_CAPACITY,
};

pub const DEFAULT_CAMERA_INDICES: &[u32] = &[0, 1, 2];

#[derive(Parser, Debug)]
#[command(
    name = "sign-scribe",
    version,
    about = "Spell hand signs from a camera into a message"
)]
pub struct Args {
    /// ONNX sign classifier (63 wrist-relative inputs, one score per label)
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Label table, one label per line in class-index order
    #[arg(long, default_value = DEFAULT_LABELS_PATH)]
    pub labels: PathBuf,

    /// Directory holding the palm detector and handpose estimator models
    #[arg(long, default_value = DEFAULT_MODELS_DIR)]
    pub models_dir: PathBuf,

    /// Camera indices to probe in order (default: 0,1,2)
    #[arg(long = "camera", value_delimiter = ',', conflicts_with = "replay")]
    pub cameras: Vec<u32>,

    /// Read PNG/JPEG frames from a directory instead of a camera
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Print the cameras the system reports and exit
    #[arg(long)]
    pub list_cameras: bool,

    /// Log predictions instead of opening a preview window
    #[arg(long)]
    pub headless: bool,

    /// Number of recent predictions the stability vote looks at
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY as u32, value_parser = clap::value_parser!(u32).range(1..))]
    pub history: u32,

    /// Keep a separate history and message for each detected hand
    #[arg(long)]
    pub per_hand: bool,

    /// Maximum hands classified per frame
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_hands: u32,

    /// Hands detected with lower confidence are ignored
    #[arg(long, default_value_t = 0.5, value_parser = parse_unit_interval)]
    pub min_detection_confidence: f32,

    /// Give up on hand detection for a frame after this many milliseconds
    #[arg(long)]
    pub detect_timeout_ms: Option<u64>,

    /// Give up on classifying a hand after this many milliseconds
    #[arg(long)]
    pub classify_timeout_ms: Option<u64>,

    /// Never download missing detector models
    #[arg(long)]
    pub offline: bool,
}

fn parse_unit_interval(raw: &str) -> Result<f32, String> {
    let value: f32 = raw.parse().map_err(|err| format!("{err}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0 and 1"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputConfig {
    Camera(Vec<u32>),
    Replay(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub scope: HistoryScope,
    pub history_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            scope: HistoryScope::Shared,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub detect: Option<Duration>,
    pub classify: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub models_dir: PathBuf,
    pub input: InputConfig,
    pub list_cameras: bool,
    pub headless: bool,
    pub stream: StreamConfig,
    pub detector: DetectorConfig,
    pub timeouts: Timeouts,
    pub allow_download: bool,
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        let input = match args.replay {
            Some(dir) => InputConfig::Replay(dir),
            None if args.cameras.is_empty() => InputConfig::Camera(DEFAULT_CAMERA_INDICES.to_vec()),
            None => InputConfig::Camera(args.cameras),
        };

        Self {
            model_path: args.model,
            labels_path: args.labels,
            models_dir: args.models_dir,
            input,
            list_cameras: args.list_cameras,
            headless: args.headless,
            stream: StreamConfig {
                scope: if args.per_hand {
                    HistoryScope::PerHand
                } else {
                    HistoryScope::Shared
                },
                history_capacity: args.history as usize,
            },
            detector: DetectorConfig {
                max_hands: args.max_hands as usize,
                min_confidence: args.min_detection_confidence,
                ..DetectorConfig::default()
            },
            timeouts: Timeouts {
                detect: args.detect_timeout_ms.map(Duration::from_millis),
                classify: args.classify_timeout_ms.map(Duration::from_millis),
            },
            allow_download: !args.offline,
        }
    }
}

impl AppConfig {
    pub fn from_args() -> Self {
        Args::parse().into()
    }
}
