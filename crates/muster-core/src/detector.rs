//! Face detector seam and region extraction.
//!
//! Detection itself is an external collaborator; the pipeline only needs
//! axis-aligned rectangles back and passes the two recognized tuning
//! options through unmodified.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Axis-aligned face bounding box in frame coordinates.
///
/// Origin may be negative when a detector reports a box partially outside
/// the frame; extraction clamps to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Detector tuning options, forwarded unmodified on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub scale_factor: f32,
    pub min_neighbors: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector model not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("detector backend: {0}")]
    Backend(String),
}

/// External face detector: grayscale frame in, zero or more boxes out.
pub trait FaceDetector {
    fn detect(
        &mut self,
        frame: &GrayImage,
        params: &DetectorParams,
    ) -> Result<Vec<FaceRect>, DetectorError>;
}

/// Crop a detected region out of a frame and normalize it to a square
/// `size` x `size` sample.
///
/// The rectangle is clamped to the frame; a region entirely outside the
/// frame yields a black sample.
pub fn extract_sample(frame: &GrayImage, rect: &FaceRect, size: u32) -> GrayImage {
    let (fw, fh) = frame.dimensions();

    let x0 = rect.x.clamp(0, fw as i32) as u32;
    let y0 = rect.y.clamp(0, fh as i32) as u32;
    let x1 = rect
        .x
        .saturating_add(rect.width.min(i32::MAX as u32) as i32)
        .clamp(0, fw as i32) as u32;
    let y1 = rect
        .y
        .saturating_add(rect.height.min(i32::MAX as u32) as i32)
        .clamp(0, fh as i32) as u32;

    if x1 <= x0 || y1 <= y0 {
        return GrayImage::new(size, size);
    }

    let crop = imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image();
    imageops::resize(&crop, size, size, FilterType::Triangle)
}
