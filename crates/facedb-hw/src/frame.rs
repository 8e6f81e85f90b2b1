//! Frame type and pixel conversion: YUYV/GREY to RGB plus a dark-frame check.

use image::{Rgb, RgbImage};

/// A captured RGB camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Average luma (0.0 to 255.0).
    pub fn avg_brightness(&self) -> f32 {
        let n = (self.width() * self.height()) as usize;
        if n == 0 {
            return 0.0;
        }
        self.image.pixels().map(|p| luma(p) as f32).sum::<f32>() / n as f32
    }

    /// True if >95% of pixels have luma below 32 (lens covered, lights off).
    pub fn is_dark(&self) -> bool {
        is_dark_frame(&self.image, 0.95)
    }
}

/// Integer BT.601 luma approximation.
fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Check whether more than `threshold_pct` of pixels fall in the darkest bucket (luma below 32).
pub fn is_dark_frame(image: &RgbImage, threshold_pct: f32) -> bool {
    let total = (image.width() * image.height()) as usize;
    if total == 0 {
        return true;
    }
    let dark = image.pixels().filter(|&p| luma(p) < 32).count();
    (dark as f32 / total as f32) > threshold_pct
}

/// Convert packed YUYV (4:2:2) to RGB using integer BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], sharing chroma.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected || width % 2 != 0 {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Expand 8-bit grayscale into RGB by replicating the channel.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height) as usize;
    if grey.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: grey.len(),
        });
    }
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let g = grey[(y * width + x) as usize];
        Rgb([g, g, g])
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1: Y0=16 (black), Y1=235 (white), neutral chroma
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red_dominant() {
        // High V pushes red up and green down.
        let rgb = yuyv_to_rgb(&[81, 90, 81, 240], 2, 1).unwrap();
        let [r, g, b] = rgb.get_pixel(0, 0).0;
        assert!(r > 200 && g < 50 && b < 50, "got {r},{g},{b}");
    }

    #[test]
    fn test_yuyv_4x2_dimensions() {
        let yuyv = vec![128u8; 16];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_grey_to_rgb_replicates() {
        let rgb = grey_to_rgb(&[7, 200], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [7, 7, 7]);
        assert_eq!(rgb.get_pixel(1, 0).0, [200, 200, 200]);
        assert!(grey_to_rgb(&[1], 2, 1).is_err());
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&RgbImage::new(10, 10), 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        assert!(!is_dark_frame(&img, 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&RgbImage::new(0, 0), 0.95));
    }

    #[test]
    fn test_dark_frame_borderline() {
        // 96 dark + 4 bright → dark; 94 dark + 6 bright → not dark
        let mostly_dark = RgbImage::from_fn(100, 1, |x, _| {
            if x < 96 { Rgb([10, 10, 10]) } else { Rgb([128, 128, 128]) }
        });
        assert!(is_dark_frame(&mostly_dark, 0.95));

        let borderline = RgbImage::from_fn(100, 1, |x, _| {
            if x < 94 { Rgb([10, 10, 10]) } else { Rgb([128, 128, 128]) }
        });
        assert!(!is_dark_frame(&borderline, 0.95));
    }

    #[test]
    fn test_frame_brightness() {
        let frame = Frame::new(RgbImage::from_pixel(4, 4, Rgb([100, 100, 100])), 3);
        assert!((frame.avg_brightness() - 100.0).abs() < 1e-3);
        assert!(!frame.is_dark());
        assert_eq!((frame.width(), frame.height(), frame.sequence), (4, 4, 3));
    }
}
