//! LBPH classifier backend — local binary pattern spatial histograms.
//!
//! A template-matching model: each training image is reduced to a grid of
//! cell-normalized LBP histograms, and prediction is a chi-square nearest
//! neighbor over all stored templates. The reported confidence is that
//! distance — lower means more similar.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierBackend, Prediction};
use crate::trainer::TrainError;

// --- Named constants (OpenCV-compatible LBPH defaults) ---
const LBPH_GRID_X: usize = 8;
const LBPH_GRID_Y: usize = 8;
const LBPH_BINS: usize = 256;

/// 8-neighbor offsets as (dy, dx), clockwise from top-left. Bit k of an
/// LBP code corresponds to offset k.
const LBP_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];

/// Trained LBPH model state: one spatial histogram per training sample,
/// each paired with its integer label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbphModel {
    sample_width: u32,
    sample_height: u32,
    histograms: Vec<Vec<f32>>,
    labels: Vec<u32>,
}

impl LbphModel {
    /// Number of stored templates.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Dimensions the training samples had; probes are resized to these.
    pub fn sample_dimensions(&self) -> (u32, u32) {
        (self.sample_width, self.sample_height)
    }

    pub(crate) fn max_label(&self) -> Option<u32> {
        self.labels.iter().copied().max()
    }
}

impl ClassifierBackend for LbphModel {
    fn train(images: &[GrayImage], labels: &[u32]) -> Result<Self, TrainError> {
        if images.len() != labels.len() {
            return Err(TrainError::LabelMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        let Some(first) = images.first() else {
            return Err(TrainError::EmptyTrainingSet);
        };

        let (sample_width, sample_height) = first.dimensions();
        let histograms = images.iter().map(spatial_histogram).collect();

        tracing::debug!(
            templates = images.len(),
            width = sample_width,
            height = sample_height,
            "LBPH templates computed"
        );

        Ok(Self {
            sample_width,
            sample_height,
            histograms,
            labels: labels.to_vec(),
        })
    }

    fn predict(&self, image: &GrayImage) -> Prediction {
        let probe_owned;
        let probe = if image.dimensions() == (self.sample_width, self.sample_height) {
            image
        } else {
            probe_owned =
                imageops::resize(image, self.sample_width, self.sample_height, FilterType::Triangle);
            &probe_owned
        };
        let probe_hist = spatial_histogram(probe);

        let mut best: Option<(u32, f32)> = None;
        for (hist, &label) in self.histograms.iter().zip(&self.labels) {
            let distance = chi_square(&probe_hist, hist);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((label, distance));
            }
        }

        match best {
            Some((label, confidence)) => Prediction { label, confidence },
            // Unreachable for models built via train(), which rejects empty
            // sets; an empty deserialized model predicts nothing credible.
            None => Prediction {
                label: 0,
                confidence: f32::INFINITY,
            },
        }
    }
}

/// LBP code for an interior pixel: bit k set when neighbor k >= center.
fn lbp_code(img: &GrayImage, x: u32, y: u32) -> u8 {
    let center = img.get_pixel(x, y).0[0];
    let mut code = 0u8;
    for (bit, (dy, dx)) in LBP_OFFSETS.iter().enumerate() {
        let nx = (x as i32 + dx) as u32;
        let ny = (y as i32 + dy) as u32;
        if img.get_pixel(nx, ny).0[0] >= center {
            code |= 1 << bit;
        }
    }
    code
}

/// Grid of cell-normalized LBP histograms, concatenated in row-major cell
/// order. Images smaller than 3x3 have no interior and yield all zeros.
fn spatial_histogram(img: &GrayImage) -> Vec<f32> {
    let mut hist = vec![0f32; LBPH_GRID_X * LBPH_GRID_Y * LBPH_BINS];
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return hist;
    }

    // Code image covers the interior (w-2 by h-2); cells are assigned by
    // proportional mapping so every code contributes regardless of size.
    let cw = (w - 2) as usize;
    let ch = (h - 2) as usize;
    let mut counts = vec![0u32; LBPH_GRID_X * LBPH_GRID_Y];

    for y in 0..ch {
        for x in 0..cw {
            let code = lbp_code(img, x as u32 + 1, y as u32 + 1);
            let cell_x = x * LBPH_GRID_X / cw;
            let cell_y = y * LBPH_GRID_Y / ch;
            let cell = cell_y * LBPH_GRID_X + cell_x;
            hist[cell * LBPH_BINS + code as usize] += 1.0;
            counts[cell] += 1;
        }
    }

    for (cell, &n) in counts.iter().enumerate() {
        if n > 0 {
            let inv = 1.0 / n as f32;
            for bin in &mut hist[cell * LBPH_BINS..(cell + 1) * LBPH_BINS] {
                *bin *= inv;
            }
        }
    }

    hist
}

/// Chi-square distance between two histograms of equal length.
fn chi_square(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let sum = x + y;
            if sum > 0.0 {
                (x - y) * (x - y) / sum
            } else {
                0.0
            }
        })
        .sum()
}
