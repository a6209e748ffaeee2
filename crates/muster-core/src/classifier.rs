//! Classifier runtime — trained model, persistence, and the decision rule.

use image::GrayImage;
use muster_store::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::labels::LabelMap;
use crate::lbph::LbphModel;
use crate::trainer::TrainError;

/// Default accept threshold on the backend's distance scale.
pub const DEFAULT_RECOGNITION_THRESHOLD: f32 = 50.0;

/// Opaque trainable template-matching backend.
///
/// Prediction is a pure function of the model and the input: same model +
/// same image must produce the same output.
pub trait ClassifierBackend: Sized {
    fn train(images: &[GrayImage], labels: &[u32]) -> Result<Self, TrainError>;
    fn predict(&self, image: &GrayImage) -> Prediction;
}

/// Raw classifier output: the nearest label and its distance-like
/// confidence (lower = more similar). Carries no thresholding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: u32,
    pub confidence: f32,
}

/// Thresholded classification of one face region.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Known { identity: Identity, confidence: f32 },
    Unknown { confidence: f32 },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no trained model at {0} — enroll samples and run training first")]
    NotFound(PathBuf),
    #[error("model artifact {path} is malformed: {detail}")]
    Malformed { path: PathBuf, detail: String },
    #[error("model I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A trained classifier artifact paired with the label map from the run
/// that produced it.
///
/// The pairing is structural: both serialize into one document, so a
/// persisted model can never be loaded with a label map it was not
/// trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    backend: LbphModel,
    label_map: LabelMap,
}

impl TrainedModel {
    pub(crate) fn new(backend: LbphModel, label_map: LabelMap) -> Self {
        Self { backend, label_map }
    }

    /// Load a persisted model.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let file = fs::File::open(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ModelError::Malformed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        model.validate(path)?;

        tracing::info!(
            path = %path.display(),
            identities = model.label_map.len(),
            templates = model.backend.len(),
            "model loaded"
        );
        Ok(model)
    }

    /// Persist the model, replacing any previous artifact at `path`.
    ///
    /// Writes to a sibling temp file and renames, so a failed write never
    /// corrupts an existing model.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));

        let file = fs::File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| ModelError::Malformed {
            path: tmp.clone(),
            detail: e.to_string(),
        })?;
        writer.flush().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    /// Classify a single grayscale face region. Pure and deterministic;
    /// the probe is resized to the trained sample dimensions if needed.
    pub fn classify(&self, face: &GrayImage) -> Prediction {
        self.backend.predict(face)
    }

    /// Apply the accept rule: confidence strictly below `threshold` maps
    /// the predicted label back to its identity, anything else is Unknown.
    pub fn decide(&self, face: &GrayImage, threshold: f32) -> Decision {
        let prediction = self.classify(face);
        if prediction.confidence < threshold {
            if let Some(identity) = self.label_map.identity_of(prediction.label) {
                return Decision::Known {
                    identity: identity.clone(),
                    confidence: prediction.confidence,
                };
            }
            // Excluded by validate(), but a decision must still come out.
            tracing::warn!(label = prediction.label, "predicted label missing from label map");
        }
        Decision::Unknown {
            confidence: prediction.confidence,
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ModelError> {
        let malformed = |detail: String| ModelError::Malformed {
            path: path.to_path_buf(),
            detail,
        };

        if self.backend.is_empty() {
            return Err(malformed("model holds no templates".to_string()));
        }
        if let Some(max) = self.backend.max_label() {
            if max as usize >= self.label_map.len() {
                return Err(malformed(format!(
                    "template label {max} outside label map of {} identities",
                    self.label_map.len()
                )));
            }
        }
        Ok(())
    }
}
