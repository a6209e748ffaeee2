//! Model trainer — builds a classifier from everything in the sample store.

use muster_store::{Identity, SampleStore, StoreError};
use std::path::Path;
use thiserror::Error;

use crate::classifier::{ClassifierBackend, ModelError, TrainedModel};
use crate::labels::LabelMap;
use crate::lbph::LbphModel;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training set is empty — enroll at least one identity first")]
    EmptyTrainingSet,
    #[error("inconsistent sample for {identity} (index {index}): {detail}")]
    InconsistentSample {
        identity: Identity,
        index: usize,
        detail: String,
    },
    #[error("images/labels length mismatch: {images} images, {labels} labels")]
    LabelMismatch { images: usize, labels: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to persist model: {0}")]
    Persist(#[from] ModelError),
}

/// Builds a fresh model + label map from all stored samples.
///
/// Identity enumeration follows the store's sorted order, so an unchanged
/// store always produces the same label assignment. Sample dimensions are
/// verified against the first sample seen; any mismatch or undecodable
/// image aborts the whole run.
pub struct Trainer<'a> {
    store: &'a SampleStore,
}

impl<'a> Trainer<'a> {
    pub fn new(store: &'a SampleStore) -> Self {
        Self { store }
    }

    /// Fit a classifier over every (image, label) pair in the store.
    pub fn train(&self) -> Result<TrainedModel, TrainError> {
        let identities = self.store.list_identities()?;

        let mut label_map = LabelMap::new();
        let mut images = Vec::new();
        let mut labels = Vec::new();
        let mut expected_dims: Option<(u32, u32)> = None;

        for identity in &identities {
            let label = label_map.assign(identity);
            let samples = self.store.samples_of(identity)?;

            for (index, sample) in samples.enumerate() {
                let image = sample.map_err(|e| match e {
                    StoreError::Image { .. } => TrainError::InconsistentSample {
                        identity: identity.clone(),
                        index,
                        detail: e.to_string(),
                    },
                    other => TrainError::Store(other),
                })?;

                let dims = image.dimensions();
                match expected_dims {
                    None => expected_dims = Some(dims),
                    Some(expected) if expected != dims => {
                        return Err(TrainError::InconsistentSample {
                            identity: identity.clone(),
                            index,
                            detail: format!(
                                "dimensions {}x{} differ from the set's {}x{}",
                                dims.0, dims.1, expected.0, expected.1
                            ),
                        });
                    }
                    Some(_) => {}
                }

                images.push(image);
                labels.push(label);
            }
        }

        if images.is_empty() {
            return Err(TrainError::EmptyTrainingSet);
        }

        let backend = LbphModel::train(&images, &labels)?;
        tracing::info!(
            identities = label_map.len(),
            samples = images.len(),
            "classifier trained"
        );
        Ok(TrainedModel::new(backend, label_map))
    }

    /// Train and, on success, persist to `model_path`, replacing any prior
    /// model. A failed run leaves the prior artifact untouched.
    pub fn train_and_save(&self, model_path: &Path) -> Result<TrainedModel, TrainError> {
        let model = self.train()?;
        model.save(model_path)?;
        tracing::info!(path = %model_path.display(), "model persisted");
        Ok(model)
    }
}
