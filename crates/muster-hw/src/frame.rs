//! Captured frame type and pixel-format conversion.

use image::GrayImage;

/// One captured grayscale frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Driver-assigned capture sequence number.
    pub sequence: u32,
}

impl Frame {
    /// Convert into an owned `GrayImage`. Returns `None` when the buffer
    /// length does not match the dimensions.
    pub fn into_image(self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data)
    }
}

/// Extract the Y channel from packed YUYV 4:2:2 data.
///
/// YUYV packs two pixels per 4 bytes as [Y0, U, Y1, V]; luminance is every
/// even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_extracts_even_bytes() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        assert_eq!(yuyv_to_grayscale(&yuyv, 2, 1).unwrap(), vec![100, 200]);
    }

    #[test]
    fn yuyv_rejects_short_buffer() {
        assert!(yuyv_to_grayscale(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn frame_into_image_checks_dimensions() {
        let good = Frame {
            data: vec![0; 12],
            width: 4,
            height: 3,
            sequence: 0,
        };
        assert!(good.into_image().is_some());

        let bad = Frame {
            data: vec![0; 11],
            width: 4,
            height: 3,
            sequence: 0,
        };
        assert!(bad.into_image().is_none());
    }
}
