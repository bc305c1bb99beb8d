use std::{fs, io::ErrorKind, path::Path};

use anyhow::{Result, anyhow, ensure};
use ndarray::Array2;
use ort::{session::Session, value::Tensor};

use super::landmarks::common::load_session;
use crate::{
    controller::SignClassifier,
    error::StartupError,
    features::{FEATURE_LEN, FeatureVector},
    types::Label,
};

pub const DEFAULT_MODEL_PATH: &str = "models/sign_classifier.onnx";
pub const DEFAULT_LABELS_PATH: &str = "models/sign_labels.txt";

/// Class index to label, in the order the classifier was trained with.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelTable {
    labels: Vec<Label>,
}

impl LabelTable {
    /// One label per line; blank lines and surrounding whitespace are ignored.
    pub fn parse(text: &str) -> Self {
        Self {
            labels: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(Label::new)
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StartupError::MissingArtifact {
                what: "label table",
                path: path.to_path_buf(),
            },
            _ => StartupError::UnreadableArtifact {
                what: "label table",
                path: path.to_path_buf(),
                source,
            },
        })?;

        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(StartupError::EmptyLabelTable {
                path: path.to_path_buf(),
            });
        }
        log::info!("loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Index of the highest score; the first wins among equals and NaN never wins.
pub fn argmax(scores: impl IntoIterator<Item = f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

pub struct OrtSignClassifier {
    session: Session,
    labels: LabelTable,
}

impl OrtSignClassifier {
    pub fn load(model_path: &Path, labels_path: &Path) -> Result<Self, StartupError> {
        // Report a missing label table before paying for the model load.
        let labels = LabelTable::load(labels_path)?;
        let session = load_session("sign classifier model", model_path)?;
        Ok(Self { session, labels })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

impl SignClassifier for OrtSignClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<Label> {
        let input = Array2::from_shape_vec((1, FEATURE_LEN), features.as_slice().to_vec())
            .map_err(|err| anyhow!("failed to build classifier input: {err}"))?;

        let outputs = self.session.run(ort::inputs![Tensor::from_array(input)?])?;
        ensure!(outputs.len() >= 1, "sign classifier returned no outputs");
        let scores = outputs[0].try_extract_array::<f32>()?;

        let index = argmax(scores.iter().copied())
            .ok_or_else(|| anyhow!("sign classifier returned an empty score vector"))?;
        self.labels.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "class {index} is outside the label table ({} labels)",
                self.labels.len()
            )
        })
    }
}
