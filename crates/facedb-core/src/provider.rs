//! Face detection + embedding behind a single seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::matcher::distance_for_cosine;
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// SCRFD detection model file name inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";
/// Lowest cosine similarity still treated as the same person for ArcFace.
pub const ARCFACE_SAME_PERSON_COSINE: f32 = 0.5;

/// Source of face regions and embeddings for a frame.
pub trait EmbeddingProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Detect faces in `frame`. The first entry is the face callers should use.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error>;

    /// Compute the embedding of one detected face.
    fn embed(&mut self, frame: &RgbImage, face: &BoundingBox) -> Result<Embedding, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// SCRFD + ArcFace provider running on ONNX Runtime.
pub struct OnnxProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxProvider {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        tracing::info!(dir = %model_dir.display(), "embedding provider ready");
        Ok(Self {
            detector,
            recognizer,
        })
    }

    /// Euclidean tolerance matching [`ARCFACE_SAME_PERSON_COSINE`] for the
    /// unit-length embeddings this provider emits (1.0).
    pub fn recommended_tolerance() -> f32 {
        distance_for_cosine(ARCFACE_SAME_PERSON_COSINE)
    }
}

impl EmbeddingProvider for OnnxProvider {
    type Error = ProviderError;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, ProviderError> {
        Ok(self.detector.detect(frame)?)
    }

    fn embed(&mut self, frame: &RgbImage, face: &BoundingBox) -> Result<Embedding, ProviderError> {
        Ok(self.recognizer.extract(frame, face)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DEFAULT_TOLERANCE;

    #[test]
    fn test_recommended_tolerance_is_looser_than_default() {
        assert!((OnnxProvider::recommended_tolerance() - 1.0).abs() < 1e-6);
        assert!(DEFAULT_TOLERANCE < OnnxProvider::recommended_tolerance());
    }
}
