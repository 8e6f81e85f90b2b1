//! ArcFace face recognizer via ONNX Runtime.
//!
//! Crops a square region around a detected face, resizes it to 112×112 and
//! extracts an L2-normalised 512-dimensional embedding (w600k_r50).

use crate::types::{BoundingBox, Embedding};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric, unlike SCRFD's 128.0
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";
/// Extra context around the detector box, as a fraction of its longer side.
const CROP_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} (download from insightface into the model directory)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face region lies outside the frame")]
    FaceOutOfFrame,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &Path) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract the embedding of `face` from `frame`.
    pub fn extract(&mut self, frame: &RgbImage, face: &BoundingBox) -> Result<Embedding, RecognizerError> {
        let (x, y, side) = square_crop(face, frame.width(), frame.height())
            .ok_or(RecognizerError::FaceOutOfFrame)?;
        let crop = imageops::crop_imm(frame, x, y, side, side).to_image();
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: l2_normalize(raw),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }
}

/// Crop centre: the landmark centroid when the detector supplied landmarks,
/// otherwise the box centre.
fn face_centre(face: &BoundingBox) -> (f32, f32) {
    match face.landmarks {
        Some(points) => {
            let n = points.len() as f32;
            let (sx, sy) = points
                .iter()
                .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
            (sx / n, sy / n)
        }
        None => (face.x + face.width / 2.0, face.y + face.height / 2.0),
    }
}

/// Square crop `(x, y, side)` centred on the face, clamped to the frame.
///
/// Returns `None` when the face centre lies outside the frame or the region is empty.
fn square_crop(face: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32)> {
    let longest = face.width.max(face.height);
    if !longest.is_finite() || longest <= 0.0 || width == 0 || height == 0 {
        return None;
    }

    let (cx, cy) = face_centre(face);
    if !(0.0..=width as f32).contains(&cx) || !(0.0..=height as f32).contains(&cy) {
        return None;
    }

    let side = (longest * (1.0 + 2.0 * CROP_MARGIN))
        .min(width.min(height) as f32)
        .floor();
    if side < 1.0 {
        return None;
    }

    let x0 = (cx - side / 2.0).clamp(0.0, width as f32 - side).round();
    let y0 = (cy - side / 2.0).clamp(0.0, height as f32 - side).round();
    Some((x0 as u32, y0 as u32, side as u32))
}

/// Resize a face crop to 112×112 and normalise into a NCHW tensor.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE;
    let resized = if crop.dimensions() == (size, size) {
        crop.clone()
    } else {
        imageops::resize(crop, size, size, FilterType::Triangle)
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: None,
        }
    }

    #[test]
    fn test_preprocess_output_shape() {
        let crop = RgbImage::new(40, 40);
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_channel_order_and_scale() {
        let crop = RgbImage::from_pixel(112, 112, image::Rgb([255, 0, 128]));
        let tensor = preprocess(&crop);
        assert!((tensor[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 5]] + 1.0).abs() < 1e-6);
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((tensor[[0, 2, 5, 5]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_square_crop_centred() {
        // 100x80 box centred at (150, 140), margin 10% each side → side 120.
        let (x, y, side) = square_crop(&face(100.0, 100.0, 100.0, 80.0), 640, 480).unwrap();
        assert_eq!(side, 120);
        assert_eq!((x, y), (90, 80));
    }

    #[test]
    fn test_square_crop_follows_landmark_centroid() {
        // Box centre is (150, 140); landmarks are shifted 10px right and 5px down.
        let landmarks = [(140.0, 125.0), (180.0, 125.0), (160.0, 145.0), (145.0, 165.0), (175.0, 165.0)];
        let with_landmarks = BoundingBox {
            landmarks: Some(landmarks),
            ..face(100.0, 100.0, 100.0, 80.0)
        };
        assert_eq!(face_centre(&with_landmarks), (160.0, 145.0));

        let (x, y, side) = square_crop(&with_landmarks, 640, 480).unwrap();
        assert_eq!(side, 120);
        assert_eq!((x, y), (100, 85));
    }

    #[test]
    fn test_square_crop_clamped_to_edge() {
        let (x, y, side) = square_crop(&face(-20.0, -20.0, 60.0, 60.0), 640, 480).unwrap();
        assert_eq!((x, y), (0, 0));
        assert_eq!(side, 72);
    }

    #[test]
    fn test_square_crop_never_exceeds_frame() {
        let (x, y, side) = square_crop(&face(0.0, 0.0, 300.0, 200.0), 320, 240).unwrap();
        assert_eq!(side, 240);
        assert!(x + side <= 320 && y + side <= 240);
    }

    #[test]
    fn test_square_crop_rejects_outside_and_degenerate() {
        assert!(square_crop(&face(1000.0, 1000.0, 50.0, 50.0), 640, 480).is_none());
        assert!(square_crop(&face(10.0, 10.0, 0.0, 0.0), 640, 480).is_none());
        assert!(square_crop(&face(10.0, 10.0, 5.0, 5.0), 0, 0).is_none());
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
