//! SeetaFace face detection behind the core `FaceDetector` trait.

use image::GrayImage;
use muster_core::{DetectorError, DetectorParams, FaceDetector, FaceRect};
use rustface::{Detector, ImageData};
use std::path::Path;

const MIN_FACE_SIZE: u32 = 40;
const SCORE_THRESH: f64 = 2.0;
const SLIDE_WINDOW_STEP: u32 = 4;

/// SeetaFace (funnel-structured cascade) detector.
pub struct SeetaDetector {
    inner: Box<dyn Detector>,
}

impl SeetaDetector {
    /// Load the SeetaFace model from disk.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_path_buf()));
        }

        let mut inner = rustface::create_detector(model_path.to_string_lossy().as_ref())
            .map_err(|e| DetectorError::Backend(format!("failed to load SeetaFace model: {e:?}")))?;
        inner.set_min_face_size(MIN_FACE_SIZE);
        inner.set_score_thresh(SCORE_THRESH);
        inner.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);

        tracing::info!(path = %model_path.display(), "SeetaFace detector loaded");
        Ok(Self { inner })
    }
}

impl FaceDetector for SeetaDetector {
    fn detect(
        &mut self,
        frame: &GrayImage,
        params: &DetectorParams,
    ) -> Result<Vec<FaceRect>, DetectorError> {
        self.inner.set_pyramid_scale_factor(pyramid_scale(params.scale_factor));
        if params.min_neighbors != DetectorParams::default().min_neighbors {
            tracing::debug!(
                min_neighbors = params.min_neighbors,
                "SeetaFace has no min_neighbors equivalent; option ignored"
            );
        }

        let mut image = ImageData::new(frame.as_raw(), frame.width(), frame.height());
        let faces = self.inner.detect(&mut image);

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRect {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect())
    }
}

/// SeetaFace walks its image pyramid downward, so its factor is the
/// reciprocal of the conventional per-step scale.
fn pyramid_scale(scale_factor: f32) -> f32 {
    (1.0 / scale_factor).clamp(0.5, 0.99)
}
